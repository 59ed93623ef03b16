use std::sync::Arc;

use chrono::{Duration, Utc};
use crewgate_core::{AccessConfig, AccessControl, AccessError, IssueInvitation};
use crewgate_storage::{
    CreateProjectParams, CreateUserParams, CreateWorkspaceParams, Grant, InvitationStatus,
    Project, ProjectRole, ResourceRef, Store, UserId, Workspace, WorkspaceRole,
};
use crewgate_store_sqlite::SqliteStore;

struct Fixture {
    access: AccessControl,
    owner: UserId,
    workspace: Workspace,
    project: Project,
}

async fn fixture() -> Fixture {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let owner = store
        .create_user(&CreateUserParams {
            email: "owner@example.com".to_string(),
        })
        .await
        .unwrap()
        .id;
    let workspace = store
        .create_workspace(&CreateWorkspaceParams {
            name: "acme".to_string(),
            owner_user_id: owner.clone(),
        })
        .await
        .unwrap();
    let project = store
        .create_project(&CreateProjectParams {
            workspace_id: workspace.id.clone(),
            name: "backlog".to_string(),
            created_by_user_id: owner.clone(),
        })
        .await
        .unwrap();
    Fixture {
        access: AccessControl::new(store, AccessConfig::default()),
        owner,
        workspace,
        project,
    }
}

async fn user(access: &AccessControl, email: &str) -> UserId {
    access
        .store()
        .create_user(&CreateUserParams {
            email: email.to_string(),
        })
        .await
        .unwrap()
        .id
}

async fn issue(access: &AccessControl, grant: Grant, usage_limit: Option<i64>) -> String {
    access
        .issue_invitation(IssueInvitation {
            grant,
            expires_at: None,
            usage_limit,
            issued_by: None,
        })
        .await
        .unwrap()
        .invitation
        .token
}

#[tokio::test]
async fn usage_limit_two_admits_two_principals() {
    let f = fixture().await;
    let token = issue(
        &f.access,
        Grant::Workspace {
            workspace_id: f.workspace.id.clone(),
            role: WorkspaceRole::Member,
        },
        Some(2),
    )
    .await;
    let a = user(&f.access, "a@example.com").await;
    let b = user(&f.access, "b@example.com").await;
    let c = user(&f.access, "c@example.com").await;

    let first = f.access.redeem_invitation(&token, Some(&a)).await.unwrap();
    assert!(first.newly_granted);
    assert_eq!(first.remaining_uses, 1);
    assert_eq!(first.status, InvitationStatus::Active);

    let second = f.access.redeem_invitation(&token, Some(&b)).await.unwrap();
    assert_eq!(second.remaining_uses, 0);
    assert_eq!(second.status, InvitationStatus::Used);

    let err = f
        .access
        .redeem_invitation(&token, Some(&c))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::InvitationExhausted));
    assert_eq!(err.status_code(), 400);

    assert!(
        f.access
            .has_workspace_role(&b, &f.workspace.id, WorkspaceRole::Member)
            .await
    );
    assert!(
        !f.access
            .has_workspace_role(&c, &f.workspace.id, WorkspaceRole::Member)
            .await
    );
}

#[tokio::test]
async fn past_expiry_persists_expired_status() {
    let f = fixture().await;
    let issued = f
        .access
        .issue_invitation(IssueInvitation {
            grant: Grant::Project {
                project_id: f.project.id.clone(),
                role: ProjectRole::Viewer,
            },
            expires_at: Some(Utc::now() - Duration::minutes(5)),
            usage_limit: Some(3),
            issued_by: None,
        })
        .await
        .unwrap();
    let token = issued.invitation.token;
    let bob = user(&f.access, "bob@example.com").await;

    let err = f
        .access
        .redeem_invitation(&token, Some(&bob))
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::InvitationExpired));

    let stored = f.access.store().get_invitation_by_token(&token).await.unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);
    assert_eq!(stored.remaining_uses, 3);

    // Once observed, expiry sticks even for a clock reading before the deadline
    let earlier = Utc::now() - Duration::hours(1);
    let again = f
        .access
        .redeem_invitation_at(&token, Some(&bob), earlier)
        .await
        .unwrap_err();
    assert!(matches!(again, AccessError::InvitationExpired));
    assert_eq!(
        f.access.effective_project_role(&bob, &f.project.id).await,
        None
    );
}

#[tokio::test]
async fn redeeming_twice_keeps_one_membership_and_spends_a_slot() {
    let f = fixture().await;
    let token = issue(
        &f.access,
        Grant::Project {
            project_id: f.project.id.clone(),
            role: ProjectRole::Member,
        },
        Some(3),
    )
    .await;
    let bob = user(&f.access, "bob@example.com").await;

    let first = f.access.redeem_invitation(&token, Some(&bob)).await.unwrap();
    assert!(first.newly_granted);
    let second = f.access.redeem_invitation(&token, Some(&bob)).await.unwrap();
    assert!(!second.newly_granted);
    assert_eq!(second.remaining_uses, 1);
    assert_eq!(second.membership.grant, first.membership.grant);

    let members = f
        .access
        .store()
        .list_members(&ResourceRef::Project(f.project.id.clone()))
        .await
        .unwrap();
    assert_eq!(members.iter().filter(|m| m.user_id == bob).count(), 1);
}

#[tokio::test]
async fn concurrent_redemptions_respect_usage_limit() {
    const LIMIT: usize = 4;
    const CONTENDERS: usize = 10;

    let f = fixture().await;
    let token = issue(
        &f.access,
        Grant::Workspace {
            workspace_id: f.workspace.id.clone(),
            role: WorkspaceRole::Member,
        },
        Some(LIMIT as i64),
    )
    .await;

    let mut principals = Vec::new();
    for i in 0..CONTENDERS {
        principals.push(user(&f.access, &format!("user{}@example.com", i)).await);
    }

    let attempts = principals.into_iter().map(|principal| {
        let access = f.access.clone();
        let token = token.clone();
        tokio::spawn(async move { access.redeem_invitation(&token, Some(&principal)).await })
    });
    let results = futures::future::join_all(attempts).await;

    let mut succeeded = 0;
    let mut exhausted = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AccessError::InvitationExhausted) => exhausted += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
    assert_eq!(succeeded, LIMIT);
    assert_eq!(exhausted, CONTENDERS - LIMIT);

    let stored = f.access.store().get_invitation_by_token(&token).await.unwrap();
    assert_eq!(stored.remaining_uses, 0);
    assert_eq!(stored.status, InvitationStatus::Used);

    let members = f
        .access
        .store()
        .list_members(&ResourceRef::Workspace(f.workspace.id.clone()))
        .await
        .unwrap();
    // The owner plus one row per successful redemption
    assert_eq!(members.len(), LIMIT + 1);
}

#[tokio::test]
async fn unknown_token_and_missing_principal() {
    let f = fixture().await;
    let bob = user(&f.access, "bob@example.com").await;

    assert!(matches!(
        f.access.redeem_invitation("inv_unknown", Some(&bob)).await,
        Err(AccessError::InvalidToken)
    ));

    let token = issue(
        &f.access,
        Grant::Workspace {
            workspace_id: f.workspace.id.clone(),
            role: WorkspaceRole::Member,
        },
        None,
    )
    .await;
    assert!(matches!(
        f.access.redeem_invitation(&token, None).await,
        Err(AccessError::Unauthenticated)
    ));
    // The failed attempt did not consume anything
    let stored = f.access.store().get_invitation_by_token(&token).await.unwrap();
    assert_eq!(stored.remaining_uses, 1);
}

#[tokio::test]
async fn inspect_reports_lazy_expiry_without_persisting() {
    let f = fixture().await;
    let expires_at = Utc::now() + Duration::hours(1);
    let issued = f
        .access
        .issue_invitation(IssueInvitation {
            grant: Grant::Workspace {
                workspace_id: f.workspace.id.clone(),
                role: WorkspaceRole::Leader,
            },
            expires_at: Some(expires_at),
            usage_limit: None,
            issued_by: Some(f.owner.clone()),
        })
        .await
        .unwrap();
    let token = issued.invitation.token.clone();

    let now_view = f.access.inspect_invitation(&token, Utc::now()).await.unwrap();
    assert_eq!(now_view.status, InvitationStatus::Active);

    let later = expires_at + Duration::minutes(1);
    let later_view = f.access.inspect_invitation(&token, later).await.unwrap();
    assert_eq!(later_view.status, InvitationStatus::Expired);

    let stored = f.access.store().get_invitation_by_token(&token).await.unwrap();
    assert_eq!(stored.status, InvitationStatus::Active);
}

#[tokio::test]
async fn join_link_carries_the_token() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let owner = store
        .create_user(&CreateUserParams {
            email: "owner@example.com".to_string(),
        })
        .await
        .unwrap()
        .id;
    let workspace = store
        .create_workspace(&CreateWorkspaceParams {
            name: "acme".to_string(),
            owner_user_id: owner,
        })
        .await
        .unwrap();
    let config = AccessConfig::with_join_url("https://app.example.com/join").unwrap();
    let access = AccessControl::new(store, config);

    let issued = access
        .issue_invitation(IssueInvitation {
            grant: Grant::Workspace {
                workspace_id: workspace.id,
                role: WorkspaceRole::Member,
            },
            expires_at: None,
            usage_limit: Some(0),
            issued_by: None,
        })
        .await
        .unwrap();
    assert_eq!(
        issued.join_link,
        format!("https://app.example.com/join?token={}", issued.invitation.token)
    );
    assert!(issued.invitation.token.starts_with("inv_"));
    assert_eq!(issued.invitation.usage_limit, 1);

    let json = serde_json::to_value(&issued).unwrap();
    assert_eq!(json["joinLink"], issued.join_link);
    assert!(json["expiresAt"].is_null());
    assert!(json.get("invitation").is_none());
}
