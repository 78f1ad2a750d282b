//! Account information and quota operations

use multicloud_core::domain::{AccountInfo, AccountQuota, OperationKind, RequestTemplate};

use crate::operation::{Normalized, OperationContext, OperationHandler};
use crate::Result;

/// Fetches the identity of the account behind the token
#[derive(Debug, Clone)]
pub struct AccountInfoOp {
    template: RequestTemplate,
}

impl AccountInfoOp {
    pub fn new(template: RequestTemplate) -> Self {
        Self { template }
    }
}

#[async_trait::async_trait]
impl OperationHandler for AccountInfoOp {
    type Output = AccountInfo;

    fn kind(&self) -> OperationKind {
        OperationKind::AccountInfo
    }

    async fn execute(&mut self, ctx: &mut OperationContext<AccountInfo>) -> Result<()> {
        match ctx.request_json::<AccountInfo>(&self.template).await? {
            Normalized::Value(info) => ctx.set_result(info),
            Normalized::Empty => ctx.set_result(AccountInfo::default()),
            Normalized::Unparsable | Normalized::ProviderError => {}
        }
        Ok(())
    }
}

/// Fetches the storage quota of the account
#[derive(Debug, Clone)]
pub struct AccountQuotaOp {
    template: RequestTemplate,
}

impl AccountQuotaOp {
    pub fn new(template: RequestTemplate) -> Self {
        Self { template }
    }
}

#[async_trait::async_trait]
impl OperationHandler for AccountQuotaOp {
    type Output = AccountQuota;

    fn kind(&self) -> OperationKind {
        OperationKind::AccountQuota
    }

    async fn execute(&mut self, ctx: &mut OperationContext<AccountQuota>) -> Result<()> {
        match ctx.request_json::<AccountQuota>(&self.template).await? {
            Normalized::Value(quota) => ctx.set_result(quota),
            Normalized::Empty => ctx.set_result(AccountQuota::default()),
            Normalized::Unparsable | Normalized::ProviderError => {}
        }
        Ok(())
    }
}
