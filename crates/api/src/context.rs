use smartwh_core::RobotId;

/// Authenticated robot for a request.
///
/// Inserted by [`crate::middleware::robot_middleware`]; present on every
/// `/api/robots` route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotContext {
    robot_id: RobotId,
}

impl RobotContext {
    pub fn new(robot_id: RobotId) -> Self {
        Self { robot_id }
    }

    pub fn robot_id(&self) -> &RobotId {
        &self.robot_id
    }
}
