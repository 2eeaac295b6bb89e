// Domain layer - timeline model, time mapping and the edit decision list

pub mod edl;
pub mod errors;
pub mod mapper;
pub mod model;
