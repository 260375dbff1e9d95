pub mod agent_loop;
pub mod crew;
pub mod relief;

pub use agent_loop::AgentRuntime;
pub use crew::Crew;
pub use relief::{ReliefAgents, ReliefCrew, ReliefPipeline, ReliefTasks};
