mod common;

use common::{wait_for, FakeContainer, FakeRuntime};
use dockwatch_core::commands::{execute, LifecycleCommand};
use dockwatch_core::config::Config;
use dockwatch_core::focus::{Focus, ViewState};
use dockwatch_core::state::DashboardState;
use dockwatch_core::EntityId;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn each_transition_cancels_the_outgoing_job() {
    let runtime = FakeRuntime::new(vec![FakeContainer::new("web", "web", "running")]);
    runtime.state().keep_live_open = true;
    let mut state = DashboardState::new(runtime.clone(), Config::default());
    let mut focus = Focus::new();

    let _updates = focus.browse(|| state.start_engine());
    assert_eq!(focus.state(), &ViewState::Browsing);
    assert!(wait_for(|| runtime.state().event_senders.len() == 1).await);

    let id = EntityId::new("web");
    let _logs = focus.view(|| state.open_stream(id.clone()));
    assert_eq!(focus.state(), &ViewState::Viewing(id.clone()));
    assert!(focus.engine().is_none());
    assert!(wait_for(|| runtime.state().event_senders.iter().all(|tx| tx.is_closed())).await);

    assert!(focus.begin_search());
    assert_eq!(focus.state(), &ViewState::Searching(id.clone()));
    focus.end_search();
    assert_eq!(focus.state(), &ViewState::Viewing(id.clone()));

    assert!(wait_for(|| !runtime.state().live_writers.is_empty()).await);
    let _updates = focus.browse(|| state.start_engine());
    assert!(focus.session().is_none());
    assert_eq!(focus.state(), &ViewState::Browsing);
    assert!(!focus.begin_search());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn detaching_keeps_entity_in_focus() {
    let runtime = FakeRuntime::new(vec![FakeContainer::new("web", "web", "running")]);
    let state = DashboardState::new(runtime, Config::default());
    let mut focus = Focus::new();
    let id = EntityId::new("web");
    let _logs = focus.view(|| state.open_stream(id.clone()));

    assert_eq!(focus.detach_stream(), Some(id.clone()));
    assert!(focus.session().is_none());
    assert_eq!(focus.state().entity(), Some(&id));
    assert_eq!(focus.detach_stream(), None);
}

#[tokio::test]
async fn commands_report_outcomes_without_touching_rows() {
    let runtime = FakeRuntime::new(vec![
        FakeContainer::new("web", "web", "running"),
        FakeContainer::new("job", "job", "exited"),
    ]);
    let state = DashboardState::new(runtime.clone(), Config::default());

    let stopped = execute(state.runtime().as_ref(), LifecycleCommand::Stop, &EntityId::new("web")).await;
    assert!(stopped.is_success());
    assert_eq!(stopped.summary(), "Container web stopped");

    let rejected = execute(state.runtime().as_ref(), LifecycleCommand::Stop, &EntityId::new("job")).await;
    assert!(!rejected.is_success());
    assert!(rejected.summary().contains("already stopped"));

    let missing = execute(state.runtime().as_ref(), LifecycleCommand::Remove, &EntityId::new("ghost")).await;
    assert!(matches!(missing.result, Err(ref err) if err.is_not_found()));

    assert_eq!(
        runtime.state().commands,
        vec![("web".to_string(), "stop".to_string())]
    );
    assert!(state.rows().with(|index| index.is_empty()));
}
