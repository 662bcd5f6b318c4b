use serde::Serialize;
use uuid::Uuid;

use smartwh_core::RobotId;

#[derive(Debug, Serialize)]
pub struct ScanReceivedResponse {
    pub status: &'static str,
    pub message_id: Uuid,
    /// False when the live notification was dropped; the scan itself is stored.
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct RobotStatusResponse {
    pub robot_id: RobotId,
    /// True while the robot has reported within the status TTL.
    pub online: bool,
    pub battery_level: i32,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RobotsStatusResponse {
    pub robots: Vec<RobotStatusResponse>,
    pub online_robots: usize,
    pub total_robots: usize,
    pub avg_battery: i32,
}
