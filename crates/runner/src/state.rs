use crate::config::Config;
use crate::supervisor::ContainerSupervisor;

pub struct AppState {
    pub config: Config,
    pub supervisor: ContainerSupervisor,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let supervisor = ContainerSupervisor::new(config.clone());
        Self { config, supervisor }
    }
}
