// One-shot point value reads and writes, gated on a connected session.

use homelink_api::{PointId, PointValueRecord};
use tracing::debug;

use crate::error::CoreError;
use crate::session::SessionManager;

impl SessionManager {
    /// Read the current values of `ids`, in controller order.
    pub async fn read_values(&self, ids: &[PointId]) -> Result<Vec<PointValueRecord>, CoreError> {
        let cookie = self.require_cookie()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.channel()
            .get_values(&cookie, ids)
            .await
            .map_err(|e| self.observe(e))
    }

    /// Write `values` in one call.
    pub async fn write_values(&self, values: &[PointValueRecord]) -> Result<(), CoreError> {
        let cookie = self.require_cookie()?;
        if values.is_empty() {
            debug!("nothing to write");
            return Ok(());
        }
        self.channel()
            .set_values(&cookie, values)
            .await
            .map_err(|e| self.observe(e))
    }
}
