use guildhall_core::{AppError, AppResult, ApplicationId, MemberId};
use guildhall_domain::{ApplicationStatus, MembershipApplication};

use super::ReviewService;

impl ReviewService {
    /// Returns one application by id.
    pub async fn find(&self, id: ApplicationId) -> AppResult<MembershipApplication> {
        self.load_all()
            .await?
            .into_iter()
            .find(|application| application.id() == id)
            .ok_or_else(|| AppError::NotFound(format!("application '{id}' does not exist")))
    }

    /// Lists applications still awaiting review.
    pub async fn list_active(&self) -> AppResult<Vec<MembershipApplication>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|application| !application.status().is_terminal())
            .collect())
    }

    /// Lists the archived projection: terminal applications.
    pub async fn list_archived(&self) -> AppResult<Vec<MembershipApplication>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(MembershipApplication::is_archived)
            .collect())
    }

    /// Returns the member's pending application, if one exists.
    pub async fn find_pending_for(
        &self,
        member: &MemberId,
    ) -> AppResult<Option<MembershipApplication>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|application| {
                application.member_id() == member
                    && application.status() == ApplicationStatus::Pending
            }))
    }
}
