// Point value operations
//
// One-shot reads/writes plus the three calls of the change-notification
// protocol: enable, long-poll wait, disable.

use std::time::Duration;

use tracing::{debug, trace};

use crate::error::Error;
use crate::models::{
    IdsRequest, Operation, PointId, PointValueRecord, SessionCookie, SetValuesRequest, WaitData,
    WaitOutcome, WaitRequest,
};
use crate::transport::{TransportChannel, WAIT_GRACE};

impl TransportChannel {
    /// Read the current values of the given points.
    pub async fn get_values(
        &self,
        cookie: &SessionCookie,
        ids: &[PointId],
    ) -> Result<Vec<PointValueRecord>, Error> {
        debug!(count = ids.len(), "reading point values");
        self.send(Operation::GetValues, &IdsRequest { ids }, Some(cookie))
            .await
    }

    /// Write values to the given points.
    pub async fn set_values(
        &self,
        cookie: &SessionCookie,
        values: &[PointValueRecord],
    ) -> Result<(), Error> {
        debug!(count = values.len(), "writing point values");
        self.send_unit(Operation::SetValues, &SetValuesRequest { values }, Some(cookie))
            .await
    }

    /// Register the points for change notification on this session.
    pub async fn enable_value_notifications(
        &self,
        cookie: &SessionCookie,
        ids: &[PointId],
    ) -> Result<(), Error> {
        debug!(count = ids.len(), "enabling value notifications");
        self.send_unit(Operation::EnableNotifications, &IdsRequest { ids }, Some(cookie))
            .await
    }

    /// Block on the controller until values change or `timeout` elapses
    /// server-side.
    ///
    /// The HTTP request timeout is stretched to `timeout + WAIT_GRACE` for
    /// this call only.
    pub async fn wait_for_value_changes(
        &self,
        cookie: &SessionCookie,
        timeout: Duration,
    ) -> Result<WaitOutcome, Error> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        trace!(timeout_ms, "waiting for value changes");

        let data: Option<WaitData> = self
            .call(
                Operation::WaitForChanges,
                &WaitRequest { timeout_ms },
                Some(cookie),
                Some(timeout.saturating_add(WAIT_GRACE)),
            )
            .await?;

        // A bare `{"meta": {"rc": "ok"}}` is treated as an empty wait.
        Ok(data.map_or(WaitOutcome::TimedOut, WaitOutcome::from))
    }

    /// Remove the points from change notification on this session.
    pub async fn disable_value_notifications(
        &self,
        cookie: &SessionCookie,
        ids: &[PointId],
    ) -> Result<(), Error> {
        debug!(count = ids.len(), "disabling value notifications");
        self.send_unit(Operation::DisableNotifications, &IdsRequest { ids }, Some(cookie))
            .await
    }
}
