use std::sync::Arc;

use relief_agent::{ReliefAgents, ReliefCrew, ReliefPipeline, ReliefTasks};
use relief_core::config::{AgentConfig, CrewConfig, ModelConfig};
use relief_core::error::ReliefError;
use relief_core::plan::{InputBundle, CLI_TOPIC_LABEL};
use relief_core::traits::CrewLauncher;
use relief_core::types::{ContentBlock, CrewEvent};
use relief_core::EventBus;
use relief_test_utils::{MockLlmClient, RecordingExecutor};
use relief_tools::ToolRegistry;

fn agents() -> ReliefAgents {
    ReliefAgents::new(Arc::new(ToolRegistry::new()), &CrewConfig::default())
}

fn district_four() -> InputBundle {
    InputBundle::compose(
        CLI_TOPIC_LABEL,
        "Earthquake Disaster Relief",
        "water shortages in district 4",
    )
}

#[tokio::test]
async fn end_to_end_with_scripted_stages() {
    let input = district_four();
    assert_eq!(
        input.as_str(),
        "Topic: Earthquake Disaster Relief\nDetailed Questions: water shortages in district 4"
    );

    let relief = ReliefCrew::assemble(&agents(), &input).unwrap();
    let exec = RecordingExecutor::new()
        .with_output("data_collection", "Report A")
        .with_output("data_analysis", "Report B")
        .with_output("decision_making", "Plan C");

    let out = relief.kickoff(&exec).await.unwrap();

    assert_eq!(out.raw, "Plan C");
    let calls = exec.calls();
    assert_eq!(calls[1].context, vec!["Report A"]);
    assert_eq!(calls[2].context, vec!["Report B"]);
    assert!(calls[2].description.contains(input.as_str()));
}

#[tokio::test]
async fn stages_always_run_collect_analyze_decide() {
    for details in ["", "   ", "medical supplies", "bridges\nand roads"] {
        let input = InputBundle::compose(CLI_TOPIC_LABEL, "Earthquake Disaster Relief", details);
        let relief = ReliefCrew::assemble(&agents(), &input).unwrap();
        let exec = RecordingExecutor::new();

        relief.kickoff(&exec).await.unwrap();

        assert_eq!(
            exec.call_names(),
            vec!["data_collection", "data_analysis", "decision_making"]
        );
        let roles: Vec<_> = exec.calls().into_iter().map(|c| c.agent_role).collect();
        assert_eq!(roles, vec!["Data Collector", "Data Analyst", "Decision Maker"]);
    }
}

#[tokio::test]
async fn analysis_failure_propagates_and_decision_never_runs() {
    let relief = ReliefCrew::assemble(&agents(), &district_four()).unwrap();
    let exec = RecordingExecutor::new()
        .with_output("data_collection", "Report A")
        .failing_at("data_analysis", "HTTP 503: model unavailable");

    let err = relief.kickoff(&exec).await.unwrap_err();

    assert!(matches!(err, ReliefError::LlmRequest(msg) if msg == "HTTP 503: model unavailable"));
    assert_eq!(exec.call_names(), vec!["data_collection", "data_analysis"]);
}

#[test]
fn collection_item_embeds_bundle_verbatim() {
    let long = "x".repeat(20_000);
    let a = agents();
    for text in ["", "   ", "\t\n", long.as_str(), "Topic: Flood\nDetailed Questions: ?"] {
        let bundle = InputBundle::from(text);
        let item = ReliefTasks::build_collection_item(a.data_collector(), &bundle);
        assert!(item.description.contains(text));
        assert!(item.description.ends_with(&format!("Inputs: {}", text)));
        assert!(item.context.is_empty());
        assert_eq!(item.expected_output, "A comprehensive report on the collected data.");
    }
}

#[test]
fn analysis_and_decision_context_wiring() {
    let a = agents();
    let input = district_four();
    let collection = ReliefTasks::build_collection_item(a.data_collector(), &input);
    let analysis = ReliefTasks::build_analysis_item(a.data_analyst(), collection.clone());
    let decision = ReliefTasks::build_decision_item(a.decision_maker(), analysis.clone(), &input);

    assert_eq!(analysis.context.len(), 1);
    assert!(Arc::ptr_eq(&analysis.context[0], &collection));
    assert_eq!(decision.context.len(), 1);
    assert!(Arc::ptr_eq(&decision.context[0], &analysis));
    assert!(decision.description.contains(input.as_str()));
}

#[test]
fn building_twice_gives_equal_but_distinct_items() {
    let a = agents();
    let input = district_four();
    let first = ReliefTasks::build_collection_item(a.data_collector(), &input);
    let second = ReliefTasks::build_collection_item(a.data_collector(), &input);
    assert_eq!(first, second);
    assert!(!Arc::ptr_eq(&first, &second));

    let d1 = ReliefTasks::build_decision_item(
        a.decision_maker(),
        ReliefTasks::build_analysis_item(a.data_analyst(), first.clone()),
        &input,
    );
    let d2 = ReliefTasks::build_decision_item(
        a.decision_maker(),
        ReliefTasks::build_analysis_item(a.data_analyst(), second.clone()),
        &input,
    );
    assert_eq!(d1, d2);
    assert!(!Arc::ptr_eq(&d1, &d2));
}

#[tokio::test]
async fn pipeline_runs_three_model_calls_and_chains_outputs() {
    let llm = MockLlmClient::new()
        .with_text_response("Report A")
        .with_text_response("Report B")
        .with_text_response("Plan C");
    let requests = llm.requests_handle();
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();

    let pipeline = ReliefPipeline::new(
        Arc::new(llm),
        ModelConfig::default(),
        AgentConfig::default(),
        CrewConfig::default(),
        Arc::new(ToolRegistry::new()),
    )
    .with_event_bus(bus.clone());

    let result = pipeline.launch(district_four()).await.unwrap();
    assert_eq!(result, "Plan C");

    let reqs = requests.lock().unwrap();
    assert_eq!(reqs.len(), 3);
    let user_text = |i: usize| match &reqs[i].messages[1].content[0] {
        ContentBlock::Text { text } => text.clone(),
        other => panic!("unexpected block {other:?}"),
    };
    assert!(user_text(0).contains("water shortages in district 4"));
    assert!(user_text(1).ends_with("This is the context you're working with:\nReport A"));
    assert!(user_text(2).ends_with("This is the context you're working with:\nReport B"));

    let mut complete = None;
    while let Ok(event) = rx.try_recv() {
        if let CrewEvent::RunComplete { input_tokens, output_tokens, .. } = event {
            complete = Some((input_tokens, output_tokens));
        }
    }
    assert_eq!(complete, Some((30, 15)));
}

#[tokio::test]
async fn pipeline_surfaces_model_failure() {
    let llm = MockLlmClient::new()
        .with_text_response("Report A")
        .with_error(ReliefError::LlmRequest("HTTP 401: invalid key".into()));

    let pipeline = ReliefPipeline::new(
        Arc::new(llm),
        ModelConfig::default(),
        AgentConfig::default(),
        CrewConfig::default(),
        Arc::new(ToolRegistry::new()),
    );

    let err = pipeline.launch(district_four()).await.unwrap_err();
    assert!(matches!(err, ReliefError::LlmRequest(msg) if msg.contains("401")));
}
