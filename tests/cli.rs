use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("vmtrans-{tag}-{now}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn vmtrans() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vmtrans"))
}

#[test]
fn translates_file_next_to_input() {
    let dir = unique_temp_dir("file");
    let input = dir.join("Simple.vm");
    fs::write(&input, "push constant 7\npush constant 8\nadd\n").unwrap();

    let status = vmtrans().arg(&input).arg("--verify").status().unwrap();
    assert!(status.success());

    let asm = fs::read_to_string(dir.join("Simple.asm")).unwrap();
    let lines: Vec<_> = asm.lines().collect();
    assert_eq!(lines[0], "@7 //push constant 7");
    assert_eq!(lines.last(), Some(&"0;JMP"));
}

#[test]
fn translates_directory_into_one_program() {
    let dir = unique_temp_dir("dir").join("Prog");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("Main.vm"), "push constant 1\npop static 0\n").unwrap();
    fs::write(dir.join("Other.vm"), "push constant 2\npop static 0\n").unwrap();
    fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let status = vmtrans()
        .arg(&dir)
        .args(["--no-comments", "--symbolic-compare"])
        .status()
        .unwrap();
    assert!(status.success());

    let asm = fs::read_to_string(dir.join("Prog.asm")).unwrap();
    assert!(asm.contains("@Main.0\n"));
    assert!(asm.contains("@Other.0\n"));
    assert!(!asm.contains("//"));
}

#[test]
fn error_exits_nonzero_without_output() {
    let dir = unique_temp_dir("err");
    let input = dir.join("Bad.vm");
    fs::write(&input, "push constant 1\npop temp 9\n").unwrap();
    let output = dir.join("out.asm");

    let result = vmtrans().arg(&input).arg("-o").arg(&output).output().unwrap();
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("line 2: pop temp 9"), "{stderr}");
    assert!(!output.exists());
}
