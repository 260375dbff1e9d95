//! The disaster-relief crew: three personas, three work items, one linear run.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::info;

use relief_core::config::{AgentConfig, CrewConfig, ModelConfig};
use relief_core::error::Result;
use relief_core::event::EventBus;
use relief_core::plan::{CrewOutput, InputBundle, Persona, Process, ToolRef, WorkItem};
use relief_core::traits::{CrewLauncher, LlmClient, TaskExecutor};
use relief_core::types::{CrewEvent, RunId};
use relief_tools::ToolRegistry;

use crate::agent_loop::AgentRuntime;
use crate::crew::Crew;

const COLLECTOR_TOOLS: [&str; 3] = ["web_search", "website_search", "scrape_website"];

/// Builds the three relief personas.
pub struct ReliefAgents {
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
}

impl ReliefAgents {
    pub fn new(tools: Arc<ToolRegistry>, config: &CrewConfig) -> Self {
        Self {
            tools,
            max_iterations: config.max_iterations,
        }
    }

    fn persona(&self, role: &str, goal: &str, backstory: &str, tools: Vec<ToolRef>) -> Arc<Persona> {
        Arc::new(Persona {
            role: role.to_string(),
            goal: goal.to_string(),
            backstory: backstory.to_string(),
            tools,
            max_iterations: self.max_iterations,
            allow_delegation: false,
        })
    }

    /// Researcher with the web tools that are registered.
    pub fn data_collector(&self) -> Arc<Persona> {
        let tools = COLLECTOR_TOOLS
            .iter()
            .filter(|name| self.tools.contains(name))
            .map(|name| ToolRef::new(*name))
            .collect();
        self.persona(
            "Data Collector",
            "Gather data from various sources about the earthquake and its aftermath.",
            "You are an expert in collecting and validating data from multiple sources.",
            tools,
        )
    }

    pub fn data_analyst(&self) -> Arc<Persona> {
        self.persona(
            "Data Analyst",
            "Analyze the collected data to identify key areas needing immediate attention.",
            "You are skilled in analyzing complex data to find actionable insights.",
            Vec::new(),
        )
    }

    pub fn decision_maker(&self) -> Arc<Persona> {
        self.persona(
            "Decision Maker",
            "Use the analyzed data to make informed decisions on resource allocation.",
            "You excel at making strategic decisions based on data insights.",
            Vec::new(),
        )
    }
}

/// Builds the three relief work items and wires their context.
pub struct ReliefTasks;

impl ReliefTasks {
    pub fn build_collection_item(persona: Arc<Persona>, input: &InputBundle) -> Arc<WorkItem> {
        Arc::new(WorkItem {
            name: "data_collection".into(),
            persona,
            description: format!(
                "Collect data from various sources about the earthquake and its aftermath. Inputs: {}",
                input
            ),
            expected_output: "A comprehensive report on the collected data.".into(),
            context: Vec::new(),
        })
    }

    pub fn build_analysis_item(persona: Arc<Persona>, prior: Arc<WorkItem>) -> Arc<WorkItem> {
        Arc::new(WorkItem {
            name: "data_analysis".into(),
            persona,
            description:
                "Analyze the collected data to identify key areas needing immediate attention."
                    .into(),
            expected_output: "An analysis report highlighting critical areas and needs.".into(),
            context: vec![prior],
        })
    }

    pub fn build_decision_item(
        persona: Arc<Persona>,
        prior: Arc<WorkItem>,
        input: &InputBundle,
    ) -> Arc<WorkItem> {
        Arc::new(WorkItem {
            name: "decision_making".into(),
            persona,
            description: format!(
                "Based on the analysis report, make informed decisions on resource allocation. Inputs: {}",
                input
            ),
            expected_output: "A strategic plan for resource allocation and relief efforts."
                .into(),
            context: vec![prior],
        })
    }
}

/// The assembled relief crew for one input bundle.
pub struct ReliefCrew {
    crew: Crew,
}

impl ReliefCrew {
    /// Fresh personas and work items for `inputs`.
    pub fn assemble(agents: &ReliefAgents, inputs: &InputBundle) -> Result<Self> {
        let collector = agents.data_collector();
        let analyst = agents.data_analyst();
        let decider = agents.decision_maker();

        let collection = ReliefTasks::build_collection_item(collector.clone(), inputs);
        let analysis = ReliefTasks::build_analysis_item(analyst.clone(), collection.clone());
        let decision = ReliefTasks::build_decision_item(decider.clone(), analysis.clone(), inputs);

        let crew = Crew::new(
            vec![collector, analyst, decider],
            vec![collection, analysis, decision],
            Process::Sequential,
        )?;
        Ok(Self { crew })
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.crew = self.crew.with_event_bus(bus);
        self
    }

    pub fn crew(&self) -> &Crew {
        &self.crew
    }

    pub async fn kickoff(&self, executor: &dyn TaskExecutor) -> Result<CrewOutput> {
        self.crew.kickoff(executor).await
    }
}

/// Production launcher: one model backend, one tool registry, one run per call.
pub struct ReliefPipeline {
    llm: Arc<dyn LlmClient>,
    model: ModelConfig,
    agent: AgentConfig,
    crew: CrewConfig,
    tools: Arc<ToolRegistry>,
    event_bus: Option<Arc<EventBus>>,
    cancel: CancellationToken,
}

impl ReliefPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: ModelConfig,
        agent: AgentConfig,
        crew: CrewConfig,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            llm,
            model,
            agent,
            crew,
            tools,
            event_bus: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Runs in flight stop when `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the crew once and return every stage's output.
    pub async fn run(&self, inputs: InputBundle) -> Result<CrewOutput> {
        let run_id = RunId::new();
        let agents = ReliefAgents::new(self.tools.clone(), &self.crew);
        let mut relief = ReliefCrew::assemble(&agents, &inputs)?;

        let mut runtime = AgentRuntime::new(
            self.llm.clone(),
            self.model.clone(),
            self.agent.clone(),
            self.tools.clone(),
        )
        .with_run_id(run_id.clone())
        .with_cancel_token(self.cancel.child_token());

        if let Some(bus) = &self.event_bus {
            relief = relief.with_event_bus(bus.clone());
            runtime = runtime.with_event_bus(bus.clone());
            bus.publish(CrewEvent::RunStarted {
                run_id: run_id.clone(),
                tasks: relief.crew().tasks().len(),
            });
        }

        info!(run_id = %run_id, input_chars = inputs.as_str().chars().count(), "Relief run started");
        let output = relief.kickoff(&runtime).await?;

        let (input_tokens, output_tokens) = runtime.usage();
        info!(run_id = %run_id, input_tokens, output_tokens, "Relief run complete");
        if let Some(bus) = &self.event_bus {
            bus.publish(CrewEvent::RunComplete {
                run_id,
                input_tokens,
                output_tokens,
            });
        }

        Ok(output)
    }
}

impl CrewLauncher for ReliefPipeline {
    fn launch(&self, inputs: InputBundle) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move { Ok(self.run(inputs).await?.raw) })
    }
}
