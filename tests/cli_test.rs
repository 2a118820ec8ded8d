use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::Path;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const SAMPLE: &str = "Hamlet. Who's there?\r\nBernardo. Nay, answer me. Stand and unfold yourself.\r\n\
Francisco. Long live the King!\r\nBernardo. He.\r\nFrancisco. You come most carefully upon your hour.\r\n";

fn run(subcommand: &str,in_path: &Path,out_path: &Path) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("huffpack").expect("binary not found");
    cmd.arg(subcommand)
        .arg("-i").arg(in_path)
        .arg("-o").arg(out_path)
        .assert()
}

fn round_trip(dat: &[u8]) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("sample.txt");
    let cmp_path = temp_dir.path().join("sample.huf");
    let out_path = temp_dir.path().join("restored.txt");
    std::fs::write(&in_path,dat)?;
    run("compress",&in_path,&cmp_path)
        .success()
        .stderr(predicate::str::contains(format!("compressed {} into",dat.len())));
    run("expand",&cmp_path,&out_path)
        .success()
        .stderr(predicate::str::contains(format!("into {}",dat.len())));
    match (std::fs::read(&in_path),std::fs::read(&out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

#[test]
fn text_round_trip() -> STDRESULT {
    round_trip(SAMPLE.as_bytes())
}

#[test]
fn empty_round_trip() -> STDRESULT {
    round_trip(&[])
}

#[test]
fn binary_round_trip() -> STDRESULT {
    let dat: Vec<u8> = (0..20000u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    round_trip(&dat)
}

#[test]
fn compressed_bytes() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("aaab.txt");
    let out_path = temp_dir.path().join("aaab.huf");
    std::fs::write(&in_path,"aaab")?;
    run("compress",&in_path,&out_path)
        .success()
        .stderr(predicate::str::contains("compressed 4 into 9"));
    assert_eq!(std::fs::read(&out_path)?,hex::decode("FACE8201262C0261E2")?);
    Ok(())
}

#[test]
fn reject_foreign_file() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("foreign.txt");
    let out_path = temp_dir.path().join("foreign.out");
    std::fs::write(&in_path,SAMPLE)?;
    run("expand",&in_path,&out_path)
        .failure()
        .stderr(predicate::str::contains("illegal header"));
    Ok(())
}
