mod common;

use common::modulo_csv;
use std::process::{Command, Stdio};

fn assert_survives_closed_stdout(format: &str) {
    let csv = modulo_csv(2_000);

    // Simulate a downstream consumer exiting early (e.g. `crossfilter ... | head`).
    let mut child = Command::new(env!("CARGO_BIN_EXE_crossfilter"))
        .arg(csv.path())
        .args(["--format", format, "--rows", "2000"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn crossfilter");

    // Closing the read end forces stdout writes to return EPIPE / BrokenPipe.
    drop(child.stdout.take());

    let output = child
        .wait_with_output()
        .expect("wait for crossfilter to finish");

    assert!(
        output.status.success(),
        "expected success even when stdout is closed\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn cli_text_output_does_not_panic_on_broken_pipe() {
    assert_survives_closed_stdout("text");
}

#[test]
fn cli_json_output_does_not_panic_on_broken_pipe() {
    assert_survives_closed_stdout("json");
}
