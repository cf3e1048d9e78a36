use stackvm::virtual_machine::assembler::{assemble_file, assemble_source, disassemble};
use stackvm::virtual_machine::config::VmConfig;
use stackvm::virtual_machine::errors::VMError;
use stackvm::virtual_machine::output::Decoding;
use stackvm::virtual_machine::vm::{Halt, Status, VM};
use std::io::Write;

const STORE_AND_RETURN: &str = r#"
    # (6 * 7) - 2, stored at offset 16 and returned as one word
    PUSH1 6
    PUSH1 7
    MUL
    PUSH1 2
    SUB
    PUSH1 16
    STORE8
    PUSH1 8     # size
    PUSH1 16    # offset
    RETURN
"#;

#[test]
fn assembled_program_returns_word() {
    let mut vm = VM::default();
    vm.load(assemble_source(STORE_AND_RETURN).unwrap());
    let output = vm.run().unwrap();

    assert_eq!(output, 40u64.to_be_bytes().to_vec());
    assert_eq!(Decoding::Unsigned.decode(&output).unwrap(), "40");
    assert_eq!(vm.status(), Status::Halted(Halt::Returned));
    assert!(vm.stack().is_empty());
}

#[test]
fn text_result_from_single_bytes() {
    let source = "PUSH1 0x68\nPUSH1 0\nSTORE1\nPUSH1 0x69\nPUSH1 1\nSTORE1\nPUSH1 2\nPUSH1 0\nRETURN";
    let mut vm = VM::default();
    let output = vm.run_fresh(assemble_source(source).unwrap()).unwrap();
    assert_eq!(Decoding::Text.decode(&output).unwrap(), "hi");
}

#[test]
fn negative_result_decodes_signed() {
    let source = "PUSH1 3\nPUSH1 5\nSUB\nPUSH1 0\nSTORE8\nPUSH1 8\nPUSH1 0\nRETURN";
    let mut vm = VM::default();
    let output = vm.run_fresh(assemble_source(source).unwrap()).unwrap();
    assert_eq!(Decoding::Signed.decode(&output).unwrap(), "-2");
}

#[test]
fn programs_share_memory_until_reset() {
    let mut vm = VM::new(VmConfig::new(8, 1024)).unwrap();
    vm.load(assemble_source("PUSH8 0xCAFE\nPUSH1 0\nSTORE8").unwrap());
    vm.run().unwrap();

    vm.load(assemble_source("PUSH1 8\nPUSH1 0\nRETURN").unwrap());
    assert_eq!(vm.run().unwrap(), 0xCAFEu64.to_be_bytes().to_vec());

    vm.reset();
    assert_eq!(vm.run().unwrap(), vec![0; 8]);
}

#[test]
fn fault_reports_failing_instruction() {
    let mut vm = VM::new(VmConfig::new(8, 32)).unwrap();
    vm.load(assemble_source("PUSH1 1\nPUSH1 40\nSTORE8").unwrap());
    assert_eq!(
        vm.run(),
        Err(VMError::MemoryOutOfBounds {
            offset: 40,
            len: 8,
            capacity: 32
        })
    );
    assert_eq!(vm.pc(), 4);
    assert_eq!(vm.stack(), &[1, 40]);
    assert_eq!(vm.status(), Status::Halted(Halt::Faulted));
}

#[test]
fn bytecode_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("program.asm");
    let mut file = std::fs::File::create(&source_path).unwrap();
    file.write_all(STORE_AND_RETURN.as_bytes()).unwrap();
    drop(file);

    let bytecode = assemble_file(&source_path).unwrap();
    let bin_path = dir.path().join("program.bin");
    std::fs::write(&bin_path, &bytecode).unwrap();

    let loaded = std::fs::read(&bin_path).unwrap();
    assert_eq!(assemble_source(disassemble(&loaded).unwrap()).unwrap(), bytecode);

    let mut vm = VM::default();
    assert_eq!(
        vm.run_fresh(loaded).unwrap(),
        40u64.to_be_bytes().to_vec()
    );
}
