//! Console tests: scripted sessions over in-memory channels.

use std::io::{self, Write};
use std::thread;

use tether_console::{
    Console, ConsoleConfig, ConsoleError, EvaluationOutcome, SessionEnd, Terminal,
};

// ─────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────

type MemoryTerminal<'a> = Terminal<&'a [u8], Vec<u8>>;

fn session_with(input: &str, config: ConsoleConfig) -> (SessionEnd, String) {
    let terminal = Terminal::new(input.as_bytes(), Vec::new());
    let mut console = Console::new(terminal, config);
    let end = console.run().expect("in-memory session should not fail");
    let (_, written) = console.into_channel().into_parts();
    (end, String::from_utf8(written).expect("output is utf-8"))
}

fn session(input: &str) -> (SessionEnd, String) {
    session_with(input, ConsoleConfig::default())
}

/// Output of a session that ends by running out of input.
fn transcript(input: &str) -> String {
    let (end, output) = session(input);
    assert_eq!(end, SessionEnd::ChannelClosed);
    output
}

fn idle_console(config: ConsoleConfig) -> Console<MemoryTerminal<'static>> {
    Console::new(Terminal::new(&b""[..], Vec::new()), config)
}

// ─────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_expression_value_is_echoed() {
    assert_eq!(transcript("2 + 2\n"), ">>> 4\n>>> ");
}

#[test]
fn test_statement_prints_nothing_but_binds() {
    assert_eq!(transcript("x = 5\nx\n"), ">>> >>> 5\n>>> ");
}

#[test]
fn test_text_value_is_quoted() {
    assert_eq!(transcript("\"hi\"\n"), ">>> 'hi'\n>>> ");
}

#[test]
fn test_none_is_suppressed() {
    assert_eq!(transcript("None\n"), ">>> >>> ");
}

#[test]
fn test_print_goes_to_channel() {
    assert_eq!(transcript("print('a', 2)\n"), ">>> a 2\n>>> ");
}

#[test]
fn test_float_and_container_rendering() {
    assert_eq!(
        transcript("8 / 2\n[1, 'a']\n{'k': (1,)}\n"),
        ">>> 4.0\n>>> [1, 'a']\n>>> {'k': (1,)}\n>>> "
    );
}

// ─────────────────────────────────────────────────────────────────────
// Multi-line Units
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_open_bracket_continues_without_diagnostic() {
    assert_eq!(transcript("(1 +\n 2)\n"), ">>> ... 3\n>>> ");
}

#[test]
fn test_block_runs_after_blank_line() {
    let output = transcript("def sq(x):\n    return x * x\n\nsq(4)\n");
    assert_eq!(output, ">>> ... ... >>> 16\n>>> ");
}

#[test]
fn test_if_block_with_else() {
    let output = transcript("if 1 > 2:\n    print('big')\nelse:\n    print('small')\n\n");
    assert_eq!(output, ">>> ... ... ... ... small\n>>> ");
}

#[test]
fn test_block_without_body_is_indentation_error() {
    let output = transcript("if True:\n\n");
    assert!(output.starts_with(">>> ... "));
    assert!(output.ends_with("IndentationError: expected an indented block\n>>> "));
}

#[test]
fn test_push_line_reports_need_more_input() {
    let mut console = idle_console(ConsoleConfig::default());
    assert_eq!(
        console.push_line("[1,".into()).unwrap(),
        EvaluationOutcome::NeedMoreInput
    );
    assert_eq!(console.pending().len(), 1);
    assert_eq!(console.current_prompt(), "... ");
    assert_eq!(
        console.push_line("2]".into()).unwrap(),
        EvaluationOutcome::Value("[1, 2]".into())
    );
    assert!(console.pending().is_empty());
    assert_eq!(console.current_prompt(), ">>> ");
}

// ─────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_syntax_error_then_recovery() {
    let output = transcript("x = = 1\n1\n");
    let expected = concat!(
        ">>> ",
        "  File \"<console>\", line 1\n",
        "    x = = 1\n",
        "        ^\n",
        "SyntaxError: invalid syntax\n",
        ">>> 1\n",
        ">>> ",
    );
    assert_eq!(output, expected);
}

#[test]
fn test_runtime_fault_renders_traceback_once() {
    let output = transcript("1 / 0\n");
    assert_eq!(
        output,
        concat!(
            ">>> Traceback (most recent call last):\n",
            "  File \"<console>\", line 1, in <module>\n",
            "ZeroDivisionError: division by zero\n",
            ">>> ",
        )
    );
}

#[test]
fn test_partial_effects_survive_fault() {
    let output = transcript("xs = []\nfor i in range(3):\n    xs.append(i)\n    1 / 0\n\nxs\n");
    assert_eq!(output.matches("Traceback").count(), 1);
    assert!(output.contains("  File \"<console>\", line 3, in <module>\n"));
    assert!(output.ends_with(">>> [0]\n>>> "));
}

#[test]
fn test_traceback_names_function() {
    let output = transcript("def f():\n    return y\n\nf()\n");
    assert!(output.contains(concat!(
        "Traceback (most recent call last):\n",
        "  File \"<console>\", line 1, in <module>\n",
        "  File \"<console>\", line 2, in f\n",
        "NameError: name 'y' is not defined\n",
    )));
}

// ─────────────────────────────────────────────────────────────────────
// Line Editing & Decoding
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_backspace_edits_line() {
    assert_eq!(transcript("2 + 3\u{8}\u{8}2\n"), ">>> 4\n>>> ");
}

#[test]
fn test_backspace_on_empty_line_is_harmless() {
    assert_eq!(transcript("\u{8}\u{8}7\n"), ">>> 7\n>>> ");
}

#[test]
fn test_crlf_and_unterminated_last_line() {
    assert_eq!(transcript("1\r\n1 + 1"), ">>> 1\n>>> 2\n>>> ");
}

// ─────────────────────────────────────────────────────────────────────
// Session End & Configuration
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_empty_channel_closes_cleanly() {
    assert_eq!(session(""), (SessionEnd::ChannelClosed, ">>> ".to_string()));
}

#[test]
fn test_channel_closed_mid_unit() {
    let (end, output) = session("def f():\n");
    assert_eq!(end, SessionEnd::ChannelClosed);
    assert_eq!(output, ">>> ... ");
}

#[test]
fn test_exit_ends_session_with_code() {
    let (end, output) = session("exit(3)\nprint('never')\n");
    assert_eq!(end, SessionEnd::Exited(3));
    assert_eq!(output, ">>> ");
}

#[test]
fn test_quit_with_message() {
    let (end, output) = session("quit('bye')\n");
    assert_eq!(end, SessionEnd::Exited(1));
    assert_eq!(output, ">>> bye\n");
}

#[test]
fn test_banner_and_custom_prompts() {
    let config = ConsoleConfig {
        prompt: "$ ".into(),
        continuation_prompt: "> ".into(),
        banner: Some("tether ready".into()),
        ..ConsoleConfig::default()
    };
    let (_, output) = session_with("(1,\n)\n", config);
    assert_eq!(output, "tether ready\n$ > (1,)\n$ ");
}

#[test]
fn test_filename_appears_in_diagnostics() {
    let config = ConsoleConfig {
        filename: "<remote>".into(),
        ..ConsoleConfig::default()
    };
    let (_, output) = session_with("nope\n", config);
    assert!(output.contains("File \"<remote>\", line 1, in <module>"));
}

#[test]
fn test_step_limit_from_config() {
    let config = ConsoleConfig {
        step_limit: Some(500),
        ..ConsoleConfig::default()
    };
    let (end, output) = session_with("while True:\n    pass\n\n1\n", config);
    assert_eq!(end, SessionEnd::ChannelClosed);
    assert!(output.contains("RuntimeError: step limit exceeded\n"));
    assert!(output.ends_with(">>> 1\n>>> "));
}

// ─────────────────────────────────────────────────────────────────────
// Resource limits
// ─────────────────────────────────────────────────────────────────────

#[test]
fn test_deeply_nested_list_is_safe() {
    let output = transcript(concat!(
        "x = []\n",
        "for i in range(200000):\n",
        "    x = [x]\n",
        "\n",
        "len(str(x))\n",
        "x == [x]\n",
        "x = 0\n",
        "1\n",
    ));
    assert!(output.contains(
        "RecursionError: maximum recursion depth exceeded while getting the repr of an object\n"
    ));
    assert!(output.contains("RecursionError: maximum recursion depth exceeded in comparison\n"));
    assert!(output.ends_with(">>> 1\n>>> "));
}

#[test]
fn test_runaway_recursion_on_small_thread() {
    let worker = thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| transcript("def f(): return f()\n\nf()\n1\n"))
        .expect("spawn console thread");
    let output = worker.join().expect("console thread completes");
    assert!(output.contains("RecursionError: maximum recursion depth exceeded\n"));
    assert!(output.contains("more times]\n"));
    assert!(output.ends_with(">>> 1\n>>> "));
}

/// A writer that rejects every write.
struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_write_failure_is_an_io_error() {
    let mut console = Console::new(
        Terminal::new(&b"1\n"[..], BrokenPipe),
        ConsoleConfig::default(),
    );
    match console.run() {
        Err(ConsoleError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("expected an I/O error, got {other:?}"),
    }
}
