//! End-to-end tests against a shell-script kernel.

use std::{fs, path::PathBuf};

use mathline_core::{Link, LinkConfig, SessionConfig, link::code};
use mathline_session::{ConnectError, Session, SessionError};
use mathline_transport::{LaunchError, MessageFrame, ProcessLink};
use pretty_assertions::assert_eq;

/// Greets, answers the `$PrePrint` assignment, answers one evaluation with
/// `3`, then echoes the next message back as text and exits.
const KERNEL: &str = r#"
echo '{"packet":8,"args":[{"string":"In[1]:= "}]}'
read pre_print
echo '{"packet":3,"args":[{"string":"InputForm"}]}'
read evaluation
echo '{"packet":3,"args":[{"string":"3"}]}'
read -r echo
printf '{"packet":2,"args":[{"string":"%s\\n"}]}\n' "$(printf '%s' "$echo" | sed 's/"/\\"/g')"
printf '{"packet":3,"args":[{"string":"done"}]}\n'
"#;

fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("kernel.sh");
    fs::write(&path, body).unwrap();
    path
}

fn has_sh() -> bool {
    which::which("sh").is_ok()
}

fn config(path: &std::path::Path) -> SessionConfig {
    SessionConfig {
        link: LinkConfig {
            name: format!("sh {}", path.display()),
            ..LinkConfig::default()
        },
        ..SessionConfig::headless()
    }
}

#[test]
fn test_headless_turn_over_process() {
    if !has_sh() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, KERNEL);

    let mut session = Session::open(config(&path), Vec::new(), ProcessLink::open).unwrap();
    assert_eq!(session.kernel_prompt(), "In[1]:= ");

    session.evaluate("1+2").unwrap();
    session.process_response().unwrap();
    assert_eq!(String::from_utf8(session.writer().clone()).unwrap(), "3\n");

    session.evaluate("2+2").unwrap();
    session.process_response().unwrap();

    let output = String::from_utf8(session.writer().clone()).unwrap();
    let echoed = output.lines().nth(1).unwrap();
    let frame = MessageFrame::decode(echoed).unwrap();
    assert_eq!(frame.message.len(), 4);
    assert!(output.ends_with("done\n"));
}

#[test]
fn test_kernel_exit_is_a_closed_link() {
    if !has_sh() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = script(
        &dir,
        r#"
echo '{"packet":8,"args":[{"string":"In[1]:= "}]}'
read pre_print
echo '{"packet":3,"args":[{"string":"InputForm"}]}'
read evaluation
"#,
    );

    let mut session = Session::open(config(&path), Vec::new(), ProcessLink::open).unwrap();
    session.evaluate("Quit[]").unwrap();
    let err = session.process_response().unwrap_err();

    assert!(matches!(err, SessionError::KernelError { code: c, .. } if c == code::CLOSED));
    assert!(!session.is_connected());
}

#[test]
fn test_garbage_output_is_bad_data() {
    if !has_sh() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "echo 'Mathematica 13.2.0 Kernel'\nsleep 1\n");

    let result = Session::open(config(&path), Vec::new(), ProcessLink::open);
    match result {
        Err(ConnectError::Initialize(SessionError::KernelError { code: c, .. })) => {
            assert_eq!(c, code::BAD_DATA);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("garbage greeting accepted"),
    }
}

#[test]
fn test_missing_kernel_fails_to_open() {
    let config = LinkConfig {
        name: "/no/such/kernel -mathlink".into(),
        ..LinkConfig::default()
    };
    assert!(matches!(
        ProcessLink::open(&config),
        Err(LaunchError::NotFound(_))
    ));

    let result = Session::open(
        SessionConfig {
            link: config,
            ..SessionConfig::default()
        },
        Vec::new(),
        ProcessLink::open,
    );
    assert!(matches!(result, Err(ConnectError::Open(_))));
}

#[test]
fn test_close_stops_the_kernel() {
    if !has_sh() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = script(&dir, "sleep 30\n");

    let mut link = ProcessLink::open(&LinkConfig {
        name: format!("sh {}", path.display()),
        ..LinkConfig::default()
    })
    .unwrap();
    assert!(link.activate());
    assert!(link.pid().is_some());
    assert!(!link.is_ready());

    link.close();
    assert!(link.pid().is_none());
    assert!(link.put_string("x").is_err());
}
