//! [`CloudResourceApi`] over the AWS service modules

use super::cloudfront::CloudFrontResources;
use super::context::{AwsContext, FromAwsContext};
use super::ec2::Ec2Resources;
use super::efs::EfsResources;
use super::elb::ElbResources;
use super::iam::IamResources;
use super::monitoring::MonitoringResources;
use stack_teardown_common::{
    CloudResourceApi, ProviderError, ResourceDescriptor, ResourceKind, Selector,
};
use tracing::debug;

/// AWS provider for every resource kind, built from one shared context
pub struct AwsCloudApi {
    region: String,
    ec2: Ec2Resources,
    efs: EfsResources,
    elb: ElbResources,
    cloudfront: CloudFrontResources,
    monitoring: MonitoringResources,
    iam: IamResources,
}

impl FromAwsContext for AwsCloudApi {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            region: ctx.region().to_string(),
            ec2: Ec2Resources::from_context(ctx),
            efs: EfsResources::from_context(ctx),
            elb: ElbResources::from_context(ctx),
            cloudfront: CloudFrontResources::from_context(ctx),
            monitoring: MonitoringResources::from_context(ctx),
            iam: IamResources::from_context(ctx),
        }
    }
}

impl AwsCloudApi {
    pub fn region(&self) -> &str {
        &self.region
    }
}

impl std::fmt::Debug for AwsCloudApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCloudApi")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl CloudResourceApi for AwsCloudApi {
    async fn describe(
        &self,
        kind: ResourceKind,
        filter: &Selector,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        debug!(%kind, selector = %filter, region = %self.region, "Describing");
        match kind {
            ResourceKind::Instance
            | ResourceKind::SecurityGroup
            | ResourceKind::KeyPair
            | ResourceKind::SpotRequest => self.ec2.describe(kind, filter).await,
            ResourceKind::Filesystem | ResourceKind::MountTarget | ResourceKind::AccessPoint => {
                self.efs.describe(kind, filter).await
            }
            ResourceKind::LoadBalancer | ResourceKind::TargetGroup => {
                self.elb.describe(kind, filter).await
            }
            ResourceKind::CloudFrontDistribution => self.cloudfront.describe(kind, filter).await,
            ResourceKind::Alarm | ResourceKind::LogGroup => {
                self.monitoring.describe(kind, filter).await
            }
            ResourceKind::Role | ResourceKind::InstanceProfile | ResourceKind::PolicyAttachment => {
                self.iam.describe(kind, filter).await
            }
        }
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        debug!(%kind, id, "Deleting");
        match kind {
            ResourceKind::Instance
            | ResourceKind::SecurityGroup
            | ResourceKind::KeyPair
            | ResourceKind::SpotRequest => self.ec2.delete(kind, id).await,
            ResourceKind::Filesystem | ResourceKind::MountTarget | ResourceKind::AccessPoint => {
                self.efs.delete(kind, id).await
            }
            ResourceKind::LoadBalancer | ResourceKind::TargetGroup => {
                self.elb.delete(kind, id).await
            }
            ResourceKind::CloudFrontDistribution => self.cloudfront.delete(id).await,
            ResourceKind::Alarm | ResourceKind::LogGroup => self.monitoring.delete(kind, id).await,
            ResourceKind::Role | ResourceKind::InstanceProfile | ResourceKind::PolicyAttachment => {
                self.iam.delete(kind, id).await
            }
        }
    }

    async fn disable(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        debug!(%kind, id, "Disabling");
        match kind {
            ResourceKind::CloudFrontDistribution => self.cloudfront.disable(id).await,
            other => Err(ProviderError::InvalidState(format!(
                "{other} has no disable operation"
            ))),
        }
    }
}
