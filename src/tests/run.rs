use std::ffi::OsString;
use std::io::ErrorKind;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;

use crate::{Error, Stream, Streams, execute, find_command, pipeline};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bin(name: &str) -> OsString {
    find_command(name)
        .unwrap_or_else(|_| panic!("{} not found on PATH", name))
        .into_os_string()
}

fn os(s: &str) -> OsString {
    s.into()
}

#[test]
fn true_no_output() {
    let (out, err) = execute(&[bin("true")], Streams::default()).unwrap();
    assert_eq!(out, b"");
    assert_eq!(err, b"");
}

#[test]
fn echo_capture_stdout() {
    let (out, _) = execute(&[bin("echo"), os("success")], Streams::capture_stdout()).unwrap();
    assert_eq!(out, b"success\n");
}

#[test]
fn echo_default_stdout_goes_to_null() {
    let (out, err) = execute(&[bin("echo"), os("discarded")], Streams::default()).unwrap();
    assert_eq!(out, b"");
    assert_eq!(err, b"");
}

#[test]
fn cat_round_trip() {
    let (out, _) = execute(
        &[bin("cat")],
        Streams {
            stdin: Stream::Data(b"success".to_vec()),
            stdout: Stream::capture(),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, b"success");
}

#[test]
fn false_fails() {
    let err = execute(&[bin("false")], Streams::default()).unwrap_err();
    match err {
        Error::Child(failure) => assert!(!failure.status.success()),
        other => panic!("expected ChildFailure, got {:?}", other),
    }
}

#[test]
fn failure_message_carries_stderr() {
    let err = execute(&[bin("cat"), os("/does/not/exist")], Streams::default()).unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains("No such file or directory"),
        "message should carry the child's stderr, got: {:?}",
        message
    );
}

#[test]
fn three_stage_pipeline() {
    init_logging();
    let (out, _) = pipeline(
        &[
            vec![bin("echo"), os("suaaerr")],
            vec![bin("tr"), os("a"), os("c")],
            vec![bin("tr"), os("r"), os("s")],
        ],
        Streams::capture_stdout(),
    )
    .unwrap();
    assert_eq!(out, b"success\n");
}

#[test]
fn earliest_failure_is_reported() {
    let err = pipeline(
        &[
            vec![bin("echo"), os("t")],
            vec![bin("cat"), os("/nope")],
            vec![bin("false")],
        ],
        Streams::default(),
    )
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("cat"), "got: {:?}", message);
    assert!(!message.contains("false"), "got: {:?}", message);
}

#[test]
fn exec_failure_is_reported() {
    let err = execute(&[os("/no/such/binary")], Streams::default()).unwrap_err();
    match err {
        Error::Child(failure) => {
            assert_eq!(failure.status, crate::ExitStatus::Exited(127));
            assert!(failure.command.contains("/no/such/binary"));
        }
        other => panic!("expected ChildFailure, got {:?}", other),
    }
}

#[test]
fn signal_termination_is_a_failure() {
    let err = execute(
        &[bin("sh"), os("-c"), os("kill $$")],
        Streams::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("signal 15"), "got: {}", err);
}

#[test]
fn large_volume_through_dd_stages() {
    init_logging();
    let input = vec![b'a'; 8 * 1024 * 1024];
    let (out, _) = pipeline(
        &[vec![bin("dd")], vec![bin("dd")], vec![bin("dd")]],
        Streams {
            stdin: Stream::Data(input.clone()),
            stdout: Stream::capture(),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out.len(), input.len());
    assert_eq!(out, input);
}

#[test]
fn megabytes_round_trip_through_cat_stages() {
    let input: Vec<u8> = (0..24 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let (out, _) = pipeline(
        &[vec![bin("cat")], vec![bin("cat")], vec![bin("cat")]],
        Streams {
            stdin: Stream::Data(input.clone()),
            stdout: Stream::capture(),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, input);
}

#[test]
fn stdin_size_sweep_round_trips() {
    let sizes = [
        0,
        1,
        crate::posix::PIPE_BUF - 1,
        crate::posix::PIPE_BUF,
        1024 * 1024,
    ];
    for stages in 1..=3 {
        for &size in &sizes {
            let input: Vec<u8> = (0..size).map(|i| (i % 253) as u8).collect();
            let commands: Vec<Vec<OsString>> = (0..stages).map(|_| vec![bin("cat")]).collect();
            let (out, _) = pipeline(
                &commands,
                Streams {
                    stdin: Stream::Data(input.clone()),
                    stdout: Stream::capture(),
                    ..Default::default()
                },
            )
            .unwrap();
            assert_eq!(out, input, "{} bytes through {} stages", size, stages);
        }
    }
}

#[test]
fn bulk_stderr_does_not_deadlock() {
    let (out, err) = execute(
        &[
            bin("sh"),
            os("-c"),
            os("dd if=/dev/zero bs=1024 count=200 1>&2 2>/dev/null; echo done"),
        ],
        Streams {
            stdout: Stream::capture(),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, b"done\n");
    assert_eq!(err.len(), 200 * 1024);
}

#[test]
fn stderr_collected_from_every_stage() {
    let (_, err) = pipeline(
        &[
            vec![bin("sh"), os("-c"), os("echo first >&2; echo through")],
            vec![bin("sh"), os("-c"), os("cat >/dev/null; echo second >&2")],
        ],
        Streams::default(),
    )
    .unwrap();
    let err = String::from_utf8(err).unwrap();
    assert!(err.contains("first"), "got: {:?}", err);
    assert!(err.contains("second"), "got: {:?}", err);
}

#[test]
fn initial_capture_content_is_preserved() {
    let (out, _) = execute(
        &[bin("echo"), os("hello")],
        Streams {
            stdout: Stream::Data(b"pre: ".to_vec()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, b"pre: hello\n");
}

#[test]
fn external_fd_stdout() {
    let mut file = tempfile::tempfile().unwrap();
    let (out, _) = execute(
        &[bin("echo"), os("to-file")],
        Streams {
            stdout: Stream::Fd(file.as_raw_fd()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, b"");

    // The descriptor is still ours: not closed, not consumed.
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    assert_eq!(content, "to-file\n");
}

#[test]
fn external_fd_stdin() {
    let mut file = tempfile::tempfile().unwrap();
    file.write_all(b"from-file").unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    let (out, _) = execute(
        &[bin("cat")],
        Streams {
            stdin: Stream::Fd(file.as_raw_fd()),
            stdout: Stream::capture(),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, b"from-file");
}

#[test]
fn empty_pipeline_is_rejected() {
    let commands: Vec<Vec<&str>> = vec![];
    let err = pipeline(&commands, Streams::default()).unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), ErrorKind::InvalidInput),
        other => panic!("expected InvalidInput, got {:?}", other),
    }
}

#[test]
fn empty_command_is_rejected() {
    let commands: Vec<Vec<&str>> = vec![vec![]];
    let err = pipeline(&commands, Streams::default()).unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), ErrorKind::InvalidInput),
        other => panic!("expected InvalidInput, got {:?}", other),
    }
}

#[test]
fn empty_stdin_data_sends_immediate_eof() {
    let (out, _) = execute(
        &[bin("cat")],
        Streams {
            stdin: Stream::Data(Vec::new()),
            stdout: Stream::capture(),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out, b"");
}
