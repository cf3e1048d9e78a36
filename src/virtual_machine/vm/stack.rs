use crate::virtual_machine::errors::VMError;

/// Fixed-capacity operand stack of 64-bit words.
///
/// `sp` is the number of live words and the index of the next free slot.
/// Every mutating method checks its precondition first and leaves the stack
/// untouched on failure.
pub(super) struct Stack {
    slots: Box<[u64]>,
    sp: usize,
}

impl Stack {
    /// Creates an empty stack holding at most `capacity` words.
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity].into_boxed_slice(),
            sp: 0,
        }
    }

    #[cfg(test)]
    pub(super) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.sp
    }

    /// Live words, bottom first.
    pub(super) fn as_slice(&self) -> &[u64] {
        &self.slots[..self.sp]
    }

    /// Fails with [`VMError::StackUnderflow`] unless at least `n` words are live.
    pub(super) fn require(&self, n: usize) -> Result<(), VMError> {
        if self.sp < n {
            return Err(VMError::StackUnderflow {
                required: n,
                available: self.sp,
            });
        }
        Ok(())
    }

    /// Returns the word `depth` slots below the top (0 is the top).
    pub(super) fn peek(&self, depth: usize) -> Result<u64, VMError> {
        self.require(depth + 1)?;
        Ok(self.slots[self.sp - 1 - depth])
    }

    /// Pushes `value`, failing with [`VMError::StackOverflow`] when full.
    pub(super) fn push(&mut self, value: u64) -> Result<(), VMError> {
        let Some(slot) = self.slots.get_mut(self.sp) else {
            return Err(VMError::StackOverflow {
                capacity: self.slots.len(),
            });
        };
        *slot = value;
        self.sp += 1;
        Ok(())
    }

    pub(super) fn pop(&mut self) -> Result<u64, VMError> {
        self.require(1)?;
        self.sp -= 1;
        Ok(self.slots[self.sp])
    }

    /// Pops the top two words, returning `(next_from_top, top)`.
    pub(super) fn pop2(&mut self) -> Result<(u64, u64), VMError> {
        self.require(2)?;
        let top = self.slots[self.sp - 1];
        let below = self.slots[self.sp - 2];
        self.sp -= 2;
        Ok((below, top))
    }

    /// Overwrites the top word. The stack must be non-empty.
    pub(super) fn replace_top(&mut self, value: u64) -> Result<(), VMError> {
        self.require(1)?;
        self.slots[self.sp - 1] = value;
        Ok(())
    }

    pub(super) fn clear(&mut self) {
        self.sp = 0;
    }
}
