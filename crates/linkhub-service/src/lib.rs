pub mod auth;
pub mod collaborators;
pub mod config;
pub mod links;
pub mod members;
pub mod reconciler;
pub mod spaces;

pub use config::{Config, Services};
pub use links::LinkService;
pub use members::MemberService;
pub use reconciler::CounterReconciler;
pub use spaces::SpaceService;
