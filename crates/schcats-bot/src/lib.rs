pub mod bot;
pub mod policy;

pub use bot::{
    Decision, DoubtPredictor, ReasoningMode, Tom0MemoryAgent, Tom0Params, Tom1Agent, Tom1Params,
    fallback_triggered, tom0_decide,
};
pub use policy::Policy;
