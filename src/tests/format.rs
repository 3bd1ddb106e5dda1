use crate::format::{CommandTree, format_commands};

#[test]
fn single_word() {
    let word = CommandTree::Word("echo".into());
    assert_eq!(format_commands(&word), "echo");
}

#[test]
fn single_command() {
    let cmd = CommandTree::command(&["echo", "test"]);
    assert_eq!(format_commands(&cmd), "echo test");
}

#[test]
fn pipeline_of_commands() {
    let pipeline = CommandTree::pipeline(&[vec!["echo", "t"], vec!["tr", "t", "z"]]);
    assert_eq!(format_commands(&pipeline), "echo t | tr t z");
}

#[test]
fn three_stage_pipeline() {
    let pipeline = CommandTree::pipeline(&[
        vec!["echo", "test"],
        vec!["tr", "t", "z"],
        vec!["tr", "z", "t"],
    ]);
    assert_eq!(format_commands(&pipeline), "echo test | tr t z | tr z t");
}

#[test]
fn one_element_pipeline_matches_command() {
    let cmd = CommandTree::command(&["cat", "/nope"]);
    let pipeline = CommandTree::pipeline(&[vec!["cat", "/nope"]]);
    assert_eq!(format_commands(&pipeline), format_commands(&cmd));
}

#[test]
fn spring_of_pipelines() {
    let spring = CommandTree::Seq(vec![
        CommandTree::pipeline(&[vec!["a"], vec!["b"], vec!["c"]]),
        CommandTree::pipeline(&[vec!["d"], vec!["e"]]),
    ]);
    assert_eq!(format_commands(&spring), "(a | b | c + d | e)");
}

#[test]
fn mixed_depth_spring() {
    // One pipeline and one plain command side by side.
    let spring = CommandTree::Seq(vec![
        CommandTree::pipeline(&[vec!["a", "x"], vec!["b"]]),
        CommandTree::command(&["c", "d"]),
    ]);
    assert_eq!(format_commands(&spring), "(a x | b + c d)");
}

#[test]
fn deeper_nesting_parenthesizes_recursively() {
    let spring = CommandTree::Seq(vec![
        CommandTree::pipeline(&[vec!["a"], vec!["b"]]),
        CommandTree::pipeline(&[vec!["c"]]),
    ]);
    let nested = CommandTree::Seq(vec![spring, CommandTree::pipeline(&[vec!["d"]])]);
    assert_eq!(format_commands(&nested), "((a | b + c) + d)");
}

#[test]
fn display_matches_format_commands() {
    let pipeline = CommandTree::pipeline(&[vec!["echo", "t"], vec!["cat"]]);
    assert_eq!(pipeline.to_string(), format_commands(&pipeline));
}
