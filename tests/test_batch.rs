//! Integration tests for batches and their interaction with blocks

#[path = "common/mod.rs"]
mod common;
use common::{logging_shell, run, run_on, shell, CliError};

#[test]
fn test_batch_commits_as_one_composite() {
    let (mut sh, log) = logging_shell();
    let out = run_on(
        &mut sh,
        "batch\n\
         /deployment=new.war:add(enabled=false)\n\
         /deployment=legacy.war:remove\n\
         list-batch\n\
         run-batch",
    )
    .unwrap();
    assert_eq!(out[0], "#1 /deployment=new.war:add(enabled=false)");
    assert_eq!(out[1], "#2 /deployment=legacy.war:remove");
    assert_eq!(out[2], "The batch executed successfully");
    assert_eq!(*log.borrow(), vec!["composite"]);

    let out = run_on(&mut sh, ":read-children-names(child-type=deployment)").unwrap();
    assert!(out[0].contains("new.war"));
    assert!(!out[0].contains("legacy.war"));
}

#[test]
fn test_failed_batch_rolls_back() {
    let mut sh = shell();
    let err = run_on(
        &mut sh,
        "batch\n\
         /deployment=app.war:remove\n\
         /deployment=none.war:remove\n\
         run-batch",
    )
    .unwrap_err();
    assert!(matches!(err, CliError::OperationFailed(ref d) if d.contains("step-2")));
    assert!(!sh.session().batch_active());
    let out = run_on(&mut sh, "/deployment=app.war:read-attribute(name=enabled)").unwrap();
    assert_eq!(out.len(), 1);
}

#[test]
fn test_batch_commands_need_a_batch() {
    let mut sh = shell();
    assert!(matches!(sh.dispatch("run-batch"), Err(CliError::NoActiveBatch)));
    assert!(matches!(sh.dispatch("discard-batch"), Err(CliError::NoActiveBatch)));
    assert!(matches!(sh.dispatch("list-batch"), Err(CliError::NoActiveBatch)));
    sh.dispatch("batch").unwrap();
    assert!(matches!(sh.dispatch("batch"), Err(CliError::BatchAlreadyActive)));
}

#[test]
fn test_batch_inside_loop_body() {
    // each iteration opens and commits its own batch
    let (mut sh, log) = logging_shell();
    run_on(
        &mut sh,
        "for d in (x.war,y.war)\n\
         batch\n\
         /deployment=$d:add\n\
         run-batch\n\
         end-for",
    )
    .unwrap();
    assert_eq!(*log.borrow(), vec!["composite", "composite"]);
}

#[test]
fn test_block_opener_refused_during_batch() {
    let out = run(
        "batch\n\
         :read-resource\n\
         for x in (1)",
    );
    assert!(matches!(out, Err(CliError::InvalidNesting(_))));

    let mut sh = shell();
    run_on(&mut sh, "batch").unwrap();
    for opener in ["if $a == 1", "try", "for x in (1)", "record"] {
        assert!(matches!(sh.dispatch(opener), Err(CliError::InvalidNesting(_))), "{}", opener);
        assert!(!sh.is_block_open());
    }
    assert_eq!(sh.session().batch_lines().len(), 0);
}

#[test]
fn test_buffered_batch_blocks_nested_opener_until_closed() {
    let mut sh = shell();
    sh.dispatch("try").unwrap();
    sh.dispatch("batch").unwrap();
    sh.dispatch(":read-resource").unwrap();
    assert!(matches!(sh.dispatch("for x in (1)"), Err(CliError::InvalidNesting(_))));
    sh.dispatch("discard-batch").unwrap();
    sh.dispatch("for x in (1)").unwrap();
    sh.dispatch("end-for").unwrap();
    sh.dispatch("catch").unwrap();
    sh.dispatch("end-try").unwrap();
    assert!(!sh.session().batch_active());
}

#[test]
fn test_batch_left_open_after_failure_is_discarded() {
    let mut sh = shell();
    let err = run_on(
        &mut sh,
        "for x in (1)\n\
         batch\n\
         /deployment=app.war:remove\n\
         bogus\n\
         end-for",
    )
    .unwrap_err();
    assert!(matches!(err, CliError::UnknownCommand(_)));
    assert!(!sh.session().batch_active());
    // the queued remove never ran
    let out = run_on(&mut sh, "/deployment=app.war:read-attribute(name=enabled)").unwrap();
    assert_eq!(out.len(), 1);
}
