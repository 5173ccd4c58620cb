//! Route executor - applies reconciliation decisions to the kernel
//!
//! Mutations go through the host `ip` tool. They are neither retried nor
//! rolled back: adding an existing route or deleting a missing one surfaces
//! as a command failure for the caller to log.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::commands::{build_route_cmd, validate_route};
use crate::error::Result;
use crate::shell;
use crate::types::{ReconciliationDecision, RouteAction};

/// Applies one decision to the host routing table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteExecutor: Send {
    /// Install or remove a route. `Ignore` is a no-op.
    async fn apply(&mut self, decision: ReconciliationDecision) -> Result<()>;
}

/// Executor backed by `ip route add|del`.
pub struct IpRouteExecutor {
    /// Path to the `ip` binary
    ip_cmd: String,

    /// Testing support
    #[cfg(test)]
    mock_mode: bool,
    #[cfg(test)]
    captured_commands: Vec<String>,
}

impl IpRouteExecutor {
    /// Create an executor using the given `ip` binary.
    pub fn new(ip_cmd: impl Into<String>) -> Self {
        Self {
            ip_cmd: ip_cmd.into(),
            #[cfg(test)]
            mock_mode: false,
            #[cfg(test)]
            captured_commands: Vec::new(),
        }
    }

    async fn exec(&mut self, cmd: &str) -> Result<()> {
        #[cfg(test)]
        if self.mock_mode {
            self.captured_commands.push(cmd.to_string());
            return Ok(());
        }

        shell::exec_checked(cmd).await?;
        Ok(())
    }

    #[cfg(test)]
    pub fn with_mock_mode(mut self) -> Self {
        self.mock_mode = true;
        self
    }

    #[cfg(test)]
    pub fn captured_commands(&self) -> &[String] {
        &self.captured_commands
    }
}

impl Default for IpRouteExecutor {
    fn default() -> Self {
        Self::new(shell::IP_CMD)
    }
}

#[async_trait]
impl RouteExecutor for IpRouteExecutor {
    #[instrument(skip_all, fields(decision = %decision))]
    async fn apply(&mut self, decision: ReconciliationDecision) -> Result<()> {
        let (action, cidr, gateway) = match &decision {
            ReconciliationDecision::Install { cidr, node } => (RouteAction::Add, cidr, node),
            ReconciliationDecision::Remove { cidr, node } => (RouteAction::Del, cidr, node),
            ReconciliationDecision::Ignore => {
                debug!("Nothing to apply");
                return Ok(());
            }
        };

        validate_route(cidr, gateway)?;

        let cmd = build_route_cmd(&self.ip_cmd, action, cidr, gateway);
        self.exec(&cmd).await?;

        info!(%cidr, %gateway, action = action.as_str(), "Route applied");
        Ok(())
    }
}
