// Integration tests for the installer binary
//
// These run the compiled binary with a throwaway HOME and a controlled PATH,
// so no real download or environment creation can happen.

use std::process::Command;
use tempfile::TempDir;

fn installer() -> Command {
    Command::new(env!("CARGO_BIN_EXE_spyder-remote-installer"))
}

#[test]
fn test_help_mentions_version_argument() {
    let output = installer().arg("--help").output().expect("Should run binary");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[VERSION]"));
    assert!(stdout.contains("--dry-run"));
}

#[test]
fn test_missing_transfer_tools_exit_non_zero() {
    let home = TempDir::new().unwrap();
    let empty_path = TempDir::new().unwrap();

    let output = installer()
        .env("HOME", home.path())
        .env("PATH", empty_path.path())
        .output()
        .expect("Should run binary");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("curl"), "stderr: {}", stderr);
    assert!(stderr.contains("wget"), "stderr: {}", stderr);
    assert!(
        !home.path().join(".local/bin/micromamba").exists(),
        "nothing should be downloaded"
    );
}

#[test]
fn test_invalid_config_file_exits_non_zero() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("installer.json");
    std::fs::write(&config, r#"{"server_env": "same", "kernel_env": "same"}"#).unwrap();

    let output = installer()
        .env("HOME", home.path())
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Should run binary");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration error"), "stderr: {}", stderr);
}

#[test]
fn test_empty_version_selector_rejected() {
    let home = TempDir::new().unwrap();

    let output = installer()
        .env("HOME", home.path())
        .arg("")
        .output()
        .expect("Should run binary");

    assert_eq!(output.status.code(), Some(1));
}

#[cfg(unix)]
#[test]
fn test_dry_run_changes_nothing() {
    use std::os::unix::fs::PermissionsExt;

    let home = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();

    // A curl stand-in so tool selection succeeds; dry-run must never call it.
    let fake_curl = bin.path().join("curl");
    std::fs::write(&fake_curl, "#!/bin/sh\necho called > \"$HOME/curl-was-called\"\n").unwrap();
    std::fs::set_permissions(&fake_curl, std::fs::Permissions::from_mode(0o755)).unwrap();

    let output = installer()
        .env("HOME", home.path())
        .env("PATH", bin.path())
        .args(["--dry-run", ">=1.0"])
        .output()
        .expect("Should run binary");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("[dry-run] curl"));
    assert!(stdout.contains("pip install spyder-remote-services>=1.0"));
    assert!(stdout.contains("ipykernel install --user --name spyder-kernels"));
    assert!(!home.path().join("curl-was-called").exists());
    assert!(!home.path().join(".local").exists());
}

/// Write an executable shell script named `name` into `dir`.
#[cfg(unix)]
fn fake_tool(dir: &std::path::Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Arguments a fake tool recorded, one per line.
#[cfg(unix)]
fn recorded_args(home: &TempDir, tool: &str) -> Vec<String> {
    std::fs::read_to_string(home.path().join(format!("{}-args", tool)))
        .expect("tool should have been called")
        .lines()
        .map(str::to_string)
        .collect()
}

#[cfg(unix)]
#[test]
fn test_curl_opts_are_appended() {
    let home = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    fake_tool(bin.path(), "curl", "printf '%s\\n' \"$@\" > \"$HOME/curl-args\"");

    installer()
        .env("HOME", home.path())
        .env("PATH", bin.path())
        .env("CURL_OPTS", "--retry 3")
        .env_remove("WGET_OPTS")
        .output()
        .expect("Should run binary");

    let args = recorded_args(&home, "curl");
    assert!(args[0].contains("/micromamba-"), "url first: {:?}", args);
    assert_eq!(args[args.len() - 2..], ["--retry", "3"]);
    assert!(args.contains(&"-fsSL".to_string()));
}

#[cfg(unix)]
#[test]
fn test_wget_opts_are_prepended() {
    let home = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    fake_tool(bin.path(), "wget", "printf '%s\\n' \"$@\" > \"$HOME/wget-args\"");

    installer()
        .env("HOME", home.path())
        .env("PATH", bin.path())
        .env("WGET_OPTS", "--tries 2")
        .env_remove("CURL_OPTS")
        .output()
        .expect("Should run binary");

    let args = recorded_args(&home, "wget");
    assert_eq!(args[..3], ["--tries", "2", "-qO"]);
    assert!(args.last().unwrap().contains("micromamba-"));
}

#[cfg(unix)]
#[test]
fn test_non_executable_tool_is_not_used() {
    let home = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    std::fs::write(bin.path().join("curl"), "#!/bin/sh\n").unwrap();

    let output = installer()
        .env("HOME", home.path())
        .env("PATH", bin.path())
        .output()
        .expect("Should run binary");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Neither curl nor wget"), "stderr: {}", stderr);
}

#[cfg(unix)]
#[test]
fn test_sigint_stops_download_and_exits_130() {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;
    use std::process::Stdio;
    use std::time::{Duration, Instant};

    let home = TempDir::new().unwrap();
    let bin = TempDir::new().unwrap();
    fake_tool(
        bin.path(),
        "curl",
        "echo started > \"$HOME/curl-started\"\nexec sleep 30",
    );
    let path = format!("{}:/usr/bin:/bin", bin.path().display());

    let mut child = installer()
        .env("HOME", home.path())
        .env("PATH", path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Should spawn binary");

    let started = home.path().join("curl-started");
    let deadline = Instant::now() + Duration::from_secs(20);
    while !started.exists() {
        assert!(Instant::now() < deadline, "fake curl never started");
        std::thread::sleep(Duration::from_millis(50));
    }

    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    let begun = Instant::now();
    let output = child.wait_with_output().unwrap();
    assert!(begun.elapsed() < Duration::from_secs(10), "download should stop promptly");
    assert_eq!(output.status.code(), Some(130));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Interrupted"), "stderr: {}", stderr);
}
