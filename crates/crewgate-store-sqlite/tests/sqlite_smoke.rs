use chrono::{Duration, Utc};
use crewgate_storage::{
    CreateInvitationParams, CreateProjectParams, CreateUserParams, CreateWorkspaceParams, Grant,
    InvitationStatus, ProjectId, ProjectRole, ResourceRef, Store, StoreError, UserId, Workspace,
    WorkspaceId, WorkspaceRole,
};
use crewgate_store_sqlite::SqliteStore;

async fn user(s: &SqliteStore, email: &str) -> UserId {
    s.create_user(&CreateUserParams {
        email: email.to_string(),
    })
    .await
    .unwrap()
    .id
}

async fn workspace(s: &SqliteStore, owner: &UserId) -> Workspace {
    s.create_workspace(&CreateWorkspaceParams {
        name: "acme".to_string(),
        owner_user_id: owner.clone(),
    })
    .await
    .unwrap()
}

fn invitation_params(token: &str, grant: Grant, usage_limit: i64) -> CreateInvitationParams {
    CreateInvitationParams {
        token: token.to_string(),
        grant,
        expires_at: None,
        usage_limit,
        created_by_user_id: None,
    }
}

#[tokio::test]
async fn creators_are_granted_top_roles() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let alice = user(&s, "alice@example.com").await;

    let ws = workspace(&s, &alice).await;
    assert_eq!(
        s.get_workspace_role(&ws.id, &alice).await.unwrap(),
        WorkspaceRole::Owner
    );
    assert_eq!(s.get_workspace(&ws.id).await.unwrap().owner_user_id, alice);

    let project = s
        .create_project(&CreateProjectParams {
            workspace_id: ws.id.clone(),
            name: "backlog".to_string(),
            created_by_user_id: alice.clone(),
        })
        .await
        .unwrap();
    assert_eq!(
        s.get_project_role(&project.id, &alice).await.unwrap(),
        ProjectRole::Lead
    );
    assert_eq!(s.get_project(&project.id).await.unwrap().workspace_id, ws.id);
    assert_eq!(s.list_projects(&ws.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn missing_rows_are_not_found() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let alice = user(&s, "alice@example.com").await;

    let missing_ws = WorkspaceId(uuid::Uuid::now_v7());
    assert!(matches!(
        s.get_workspace(&missing_ws).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        s.get_project(&ProjectId(uuid::Uuid::now_v7())).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        s.get_workspace_role(&missing_ws, &alice).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        s.get_invitation_by_token("inv_nope").await,
        Err(StoreError::NotFound)
    ));

    // Foreign key violations surface as NotFound
    let err = s
        .create_project(&CreateProjectParams {
            workspace_id: missing_ws,
            name: "orphan".to_string(),
            created_by_user_id: alice,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
async fn duplicate_email_and_token_are_rejected() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let alice = user(&s, "alice@example.com").await;
    let err = s
        .create_user(&CreateUserParams {
            email: "alice@example.com".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));

    let ws = workspace(&s, &alice).await;
    let grant = Grant::Workspace {
        workspace_id: ws.id.clone(),
        role: WorkspaceRole::Member,
    };
    s.create_invitation(&invitation_params("inv_same", grant.clone(), 1))
        .await
        .unwrap();
    let err = s
        .create_invitation(&invitation_params("inv_same", grant, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists));
}

#[tokio::test]
async fn invitation_roundtrip_and_listing() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let alice = user(&s, "alice@example.com").await;
    let ws = workspace(&s, &alice).await;
    let project = s
        .create_project(&CreateProjectParams {
            workspace_id: ws.id.clone(),
            name: "backlog".to_string(),
            created_by_user_id: alice.clone(),
        })
        .await
        .unwrap();

    let expires_at = Utc::now() + Duration::hours(24);
    let created = s
        .create_invitation(&CreateInvitationParams {
            token: "inv_project".to_string(),
            grant: Grant::Project {
                project_id: project.id.clone(),
                role: ProjectRole::Viewer,
            },
            expires_at: Some(expires_at),
            usage_limit: 3,
            created_by_user_id: Some(alice.clone()),
        })
        .await
        .unwrap();

    let fetched = s.get_invitation_by_token("inv_project").await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.status, InvitationStatus::Active);
    assert_eq!(fetched.usage_limit, 3);
    assert_eq!(fetched.remaining_uses, 3);
    assert_eq!(fetched.created_by_user_id, Some(alice.clone()));
    assert_eq!(
        fetched.expires_at.map(|t| t.timestamp()),
        Some(expires_at.timestamp())
    );
    assert_eq!(
        fetched.grant,
        Grant::Project {
            project_id: project.id.clone(),
            role: ProjectRole::Viewer,
        }
    );

    s.create_invitation(&invitation_params(
        "inv_ws",
        Grant::Workspace {
            workspace_id: ws.id.clone(),
            role: WorkspaceRole::Leader,
        },
        1,
    ))
    .await
    .unwrap();

    let for_project = s
        .list_invitations(&ResourceRef::Project(project.id.clone()))
        .await
        .unwrap();
    assert_eq!(for_project.len(), 1);
    assert_eq!(for_project[0].token, "inv_project");

    let for_ws = s
        .list_invitations(&ResourceRef::Workspace(ws.id.clone()))
        .await
        .unwrap();
    assert_eq!(for_ws.len(), 1);
    assert_eq!(for_ws[0].token, "inv_ws");
}

#[tokio::test]
async fn consume_flips_to_used_and_then_conflicts() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let alice = user(&s, "alice@example.com").await;
    let ws = workspace(&s, &alice).await;
    let inv = s
        .create_invitation(&invitation_params(
            "inv_two",
            Grant::Workspace {
                workspace_id: ws.id.clone(),
                role: WorkspaceRole::Member,
            },
            2,
        ))
        .await
        .unwrap();

    let mut txn = s.begin_redemption().await.unwrap();
    assert_eq!(
        txn.consume_invitation_use(&inv.id).await.unwrap(),
        (1, InvitationStatus::Active)
    );
    assert_eq!(
        txn.consume_invitation_use(&inv.id).await.unwrap(),
        (0, InvitationStatus::Used)
    );
    assert!(matches!(
        txn.consume_invitation_use(&inv.id).await,
        Err(StoreError::Conflict)
    ));
    txn.commit().await.unwrap();

    let after = s.get_invitation_by_token("inv_two").await.unwrap();
    assert_eq!(after.remaining_uses, 0);
    assert_eq!(after.status, InvitationStatus::Used);
}

#[tokio::test]
async fn grant_membership_is_idempotent() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let alice = user(&s, "alice@example.com").await;
    let bob = user(&s, "bob@example.com").await;
    let ws = workspace(&s, &alice).await;

    let grant = Grant::Workspace {
        workspace_id: ws.id.clone(),
        role: WorkspaceRole::Member,
    };

    let mut txn = s.begin_redemption().await.unwrap();
    let first = txn.grant_membership(&bob, &grant).await.unwrap();
    assert!(first.created);
    // A second grant with a different role keeps the original row
    let second = txn
        .grant_membership(
            &bob,
            &Grant::Workspace {
                workspace_id: ws.id.clone(),
                role: WorkspaceRole::Leader,
            },
        )
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.membership.grant, grant);
    txn.commit().await.unwrap();

    let members = s
        .list_members(&ResourceRef::Workspace(ws.id.clone()))
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(
        s.get_workspace_role(&ws.id, &bob).await.unwrap(),
        WorkspaceRole::Member
    );
}

#[tokio::test]
async fn dropped_redemption_rolls_back() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let alice = user(&s, "alice@example.com").await;
    let bob = user(&s, "bob@example.com").await;
    let ws = workspace(&s, &alice).await;
    let grant = Grant::Workspace {
        workspace_id: ws.id.clone(),
        role: WorkspaceRole::Member,
    };
    s.create_invitation(&invitation_params("inv_drop", grant.clone(), 1))
        .await
        .unwrap();

    {
        let mut txn = s.begin_redemption().await.unwrap();
        let inv = txn.lock_invitation("inv_drop").await.unwrap();
        txn.grant_membership(&bob, &grant).await.unwrap();
        txn.consume_invitation_use(&inv.id).await.unwrap();
        // dropped without commit
    }

    let inv = s.get_invitation_by_token("inv_drop").await.unwrap();
    assert_eq!(inv.remaining_uses, 1);
    assert_eq!(inv.status, InvitationStatus::Active);
    assert!(matches!(
        s.get_workspace_role(&ws.id, &bob).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn lock_invitation_missing_token() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let mut txn = s.begin_redemption().await.unwrap();
    assert!(matches!(
        txn.lock_invitation("inv_missing").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn status_transition_persists() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let alice = user(&s, "alice@example.com").await;
    let ws = workspace(&s, &alice).await;
    let inv = s
        .create_invitation(&invitation_params(
            "inv_exp",
            Grant::Workspace {
                workspace_id: ws.id.clone(),
                role: WorkspaceRole::Member,
            },
            1,
        ))
        .await
        .unwrap();

    let mut txn = s.begin_redemption().await.unwrap();
    txn.set_invitation_status(&inv.id, InvitationStatus::Expired)
        .await
        .unwrap();
    // Consuming an expired invitation is refused
    assert!(matches!(
        txn.consume_invitation_use(&inv.id).await,
        Err(StoreError::Conflict)
    ));
    txn.commit().await.unwrap();

    let after = s.get_invitation_by_token("inv_exp").await.unwrap();
    assert_eq!(after.status, InvitationStatus::Expired);
    assert_eq!(after.remaining_uses, 1);
}

#[tokio::test]
async fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("crewgate.db").to_string_lossy()
    );

    let alice = {
        let s = SqliteStore::open(&url).await.unwrap();
        user(&s, "alice@example.com").await
    };

    let s = SqliteStore::open(&url).await.unwrap();
    assert_eq!(s.get_user(&alice).await.unwrap().email, "alice@example.com");
}
