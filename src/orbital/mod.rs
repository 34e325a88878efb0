pub mod burn;
pub mod elements;
pub mod maneuvers;
pub mod planner;

pub use burn::{estimate_burn, BurnEstimate, G0};
pub use elements::PlanarElements;
pub use maneuvers::{circularize_at_apoapsis, vis_viva_speed, CircularizationBurn};
pub use planner::{ManeuverPlan, ManeuverPlanner, ManeuverReport, PlannerPhase};
