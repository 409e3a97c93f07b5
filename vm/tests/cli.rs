use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use bytecode::BytecodeBuilder;
use heap::{CodeSpec, ImageBuilder};

fn ovm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ovm"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to spawn ovm")
}

/// `print(<const>)` as the whole program.
fn print_image(path: &Path, make_const: impl FnOnce(&mut ImageBuilder) -> object::Handle) {
    let mut code = BytecodeBuilder::new();
    code.load_name(0).load_const(0).call_function(1, 0).return_value();

    let mut b = ImageBuilder::new();
    let value = make_const(&mut b);
    b.code(&CodeSpec {
        stacksize: 2,
        name: "<module>",
        filename: "hello.py",
        bytecode: code.as_bytes(),
        names: &["print"],
        consts: &[value],
        ..CodeSpec::default()
    });
    fs::write(path, b.finish()).unwrap();
}

#[test]
fn runs_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.ohp");
    print_image(&path, |b| b.str("hello"));

    let out = ovm(&[path.to_str().unwrap()]);
    assert!(out.status.success());
    assert_eq!(out.stdout, b"hello\n");
}

#[test]
fn missing_filename() {
    let out = ovm(&[]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn bad_image_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.ohp");
    fs::write(&path, b"NOPE\0\0\0\0\0\0\0\0").unwrap();

    let out = ovm(&[path.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("bad.ohp"), "{stderr}");
    assert!(stderr.contains("format error"), "{stderr}");
}

#[test]
fn nonexistent_file_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.ohp");
    let out = ovm(&[path.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn unhandled_exception_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_print.ohp");
    print_image(&path, |b| b.int(3));

    let out = ovm(&[path.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("type mismatch"), "{stderr}");
    assert!(stderr.contains("<module>"), "{stderr}");

    let out = ovm(&["--strict", path.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn dump() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.ohp");
    print_image(&path, |b| b.str("hello"));

    let out = ovm(&["--dump", path.to_str().unwrap()]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("<id 0> Str \"hello\""), "{stdout}");
    assert!(stdout.contains("LOAD_NAME"), "{stdout}");
}
