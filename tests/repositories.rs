//! Repository and domain-service tests against a real Postgres database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use checkin::db::UnitOfWork;
use checkin::models::account::{Account, AccountFilters, CreateAccountData, Role};
use checkin::models::event::Event;
use checkin::models::scan::{CreateScanData, Scan, ScanFilters};
use checkin::models::service::{CreateServiceData, Service};
use checkin::models::veteran::{CreateVeteranData, VerificationMethod, Veteran};
use checkin::services::event_planner::{self, EventPlanError, NewEvent};
use checkin::services::scan_checkin::{self, CheckIn, CheckInResult};

async fn account(pool: &PgPool, name: &str) -> Account {
    let mut conn = pool.acquire().await.unwrap();
    Account::create(
        &mut conn,
        CreateAccountData {
            name: name.to_string(),
            password_hash: "pbkdf2-sha256$1$00$00".to_string(),
            role: Role::Supervisor,
            password_reset_required: false,
            created_by: None,
        },
    )
    .await
    .unwrap()
}

async fn service(pool: &PgPool, name: &str, by: Uuid) -> Service {
    let mut conn = pool.acquire().await.unwrap();
    Service::create(
        &mut conn,
        CreateServiceData {
            name: name.to_string(),
            description: None,
            created_by: by,
        },
    )
    .await
    .unwrap()
}

async fn veteran(pool: &PgPool, card_number: i32, by: Uuid) -> Veteran {
    let mut conn = pool.acquire().await.unwrap();
    Veteran::create(
        &mut conn,
        CreateVeteranData {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            address: "123 Main St".to_string(),
            primary_phone: "563-555-0100".to_string(),
            email: None,
            card_number: Some(card_number),
            verification_method: VerificationMethod::Dd214,
            enrolled_by: by,
        },
    )
    .await
    .unwrap()
}

fn new_event(created_by: Uuid, hosts: Vec<Uuid>, services: Vec<Uuid>) -> NewEvent {
    let start = Utc::now();
    NewEvent {
        name: "Food Drive".to_string(),
        start_time: start,
        end_time: start + Duration::hours(4),
        hosts,
        services,
        created_by,
    }
}

async fn event(pool: &PgPool, created_by: Uuid) -> Event {
    let mut uow = UnitOfWork::begin(pool).await.unwrap();
    let event = event_planner::create_event(&mut uow, new_event(created_by, vec![], vec![]))
        .await
        .unwrap();
    uow.commit().await.unwrap();
    event
}

fn check_in(event_id: Uuid, service_id: Option<Uuid>, scan_by_id: Uuid) -> CheckIn {
    CheckIn {
        event_id,
        card_number: 1234,
        service_id,
        plus_one: false,
        scan_by_id,
    }
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_event_creation_joins_every_account_and_service(pool: PgPool) {
    let alice = account(&pool, "alice").await;
    let bob = account(&pool, "bob").await;
    let food = service(&pool, "Food", alice.id).await;
    let haircuts = service(&pool, "Haircuts", alice.id).await;

    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let event = event_planner::create_event(&mut uow, new_event(alice.id, vec![alice.id], vec![food.id]))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let mut hosts = vec![alice.id, bob.id];
    hosts.sort();
    let mut services = vec![food.id, haircuts.id];
    services.sort();

    assert_eq!(event.hosts, hosts);
    assert_eq!(event.services, services);
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_uncommitted_event_is_rolled_back(pool: PgPool) {
    let alice = account(&pool, "alice").await;

    let event_id = {
        let mut uow = UnitOfWork::begin(&pool).await.unwrap();
        let event = event_planner::create_event(&mut uow, new_event(alice.id, vec![], vec![]))
            .await
            .unwrap();
        event.id
    };

    let mut conn = pool.acquire().await.unwrap();
    assert!(Event::find_by_id(&mut conn, event_id).await.unwrap().is_none());
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_unknown_host_writes_nothing(pool: PgPool) {
    let alice = account(&pool, "alice").await;
    let stranger = Uuid::new_v4();

    let mut uow = UnitOfWork::begin(&pool).await.unwrap();
    let result = event_planner::create_event(&mut uow, new_event(alice.id, vec![stranger], vec![])).await;
    drop(uow);

    match result {
        Err(EventPlanError::UnknownAccounts(missing)) => assert_eq!(missing, vec![stranger]),
        other => panic!("expected UnknownAccounts, got {:?}", other),
    }

    let mut conn = pool.acquire().await.unwrap();
    let events = Event::list(&mut conn, &Default::default()).await.unwrap();
    assert!(events.is_empty());
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_repeated_scan_stores_one_row(pool: PgPool) {
    let alice = account(&pool, "alice").await;
    veteran(&pool, 1234, alice.id).await;
    let event = event(&pool, alice.id).await;

    let mut conn = pool.acquire().await.unwrap();
    let first = scan_checkin::check_in(&mut conn, check_in(event.id, None, alice.id))
        .await
        .unwrap();
    let second = scan_checkin::check_in(&mut conn, check_in(event.id, None, alice.id))
        .await
        .unwrap();

    let (CheckInResult::Recorded(recorded), CheckInResult::AlreadyRecorded(existing)) = (first, second) else {
        panic!("expected Recorded then AlreadyRecorded");
    };
    assert_eq!(recorded, existing);

    let filters = ScanFilters {
        event_id: Some(event.id),
        ..Default::default()
    };
    assert_eq!(Scan::list(&mut conn, &filters).await.unwrap().len(), 1);
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_service_scan_needs_check_in_first(pool: PgPool) {
    let alice = account(&pool, "alice").await;
    let food = service(&pool, "Food", alice.id).await;
    let vet = veteran(&pool, 1234, alice.id).await;
    let event = event(&pool, alice.id).await;

    let mut conn = pool.acquire().await.unwrap();
    let result = scan_checkin::check_in(&mut conn, check_in(event.id, Some(food.id), alice.id))
        .await
        .unwrap();
    assert!(matches!(result, CheckInResult::NotCheckedIn { veteran_id } if veteran_id == vet.id));

    scan_checkin::check_in(&mut conn, check_in(event.id, None, alice.id))
        .await
        .unwrap();
    let result = scan_checkin::check_in(&mut conn, check_in(event.id, Some(food.id), alice.id))
        .await
        .unwrap();
    assert!(matches!(result, CheckInResult::Recorded(scan) if scan.service_id == Some(food.id)));
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_unknown_card_and_event(pool: PgPool) {
    let alice = account(&pool, "alice").await;
    let event = event(&pool, alice.id).await;

    let mut conn = pool.acquire().await.unwrap();
    let result = scan_checkin::check_in(&mut conn, check_in(event.id, None, alice.id))
        .await
        .unwrap();
    assert!(matches!(result, CheckInResult::NotEnrolled { card_number: 1234 }));

    let missing = Uuid::new_v4();
    let result = scan_checkin::check_in(&mut conn, check_in(missing, None, alice.id))
        .await
        .unwrap();
    assert!(matches!(result, CheckInResult::EventNotFound { event_id } if event_id == missing));
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_soft_deleted_accounts_leave_listings(pool: PgPool) {
    let alice = account(&pool, "alice").await;
    let bob = account(&pool, "bob").await;

    let mut conn = pool.acquire().await.unwrap();
    assert!(Account::delete(&mut conn, bob.id).await.unwrap());
    assert!(!Account::delete(&mut conn, bob.id).await.unwrap());

    let listed = Account::list(&mut conn, &AccountFilters::default()).await.unwrap();
    assert_eq!(listed.iter().map(|a| a.id).collect::<Vec<_>>(), vec![alice.id]);
    assert!(Account::find_by_name(&mut conn, "BOB").await.unwrap().is_none());

    // The name is free again once its holder is deleted
    account(&pool, "bob").await;
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_unknown_service_is_not_found(pool: PgPool) {
    let alice = account(&pool, "alice").await;
    veteran(&pool, 1234, alice.id).await;
    let event = event(&pool, alice.id).await;

    let mut conn = pool.acquire().await.unwrap();
    scan_checkin::check_in(&mut conn, check_in(event.id, None, alice.id))
        .await
        .unwrap();

    let missing = Uuid::new_v4();
    let result = scan_checkin::check_in(&mut conn, check_in(event.id, Some(missing), alice.id))
        .await
        .unwrap();
    assert!(matches!(result, CheckInResult::ServiceNotFound { service_id } if service_id == missing));

    let filters = ScanFilters {
        event_id: Some(event.id),
        ..Default::default()
    };
    assert_eq!(Scan::list(&mut conn, &filters).await.unwrap().len(), 1);
}

#[sqlx::test]
#[ignore = "requires a Postgres DATABASE_URL"]
async fn test_second_insert_of_same_key_is_skipped(pool: PgPool) {
    let alice = account(&pool, "alice").await;
    let food = service(&pool, "Food", alice.id).await;
    let vet = veteran(&pool, 1234, alice.id).await;
    let event = event(&pool, alice.id).await;

    let mut conn = pool.acquire().await.unwrap();

    // General check-ins and service scans are guarded by separate partial indexes
    for service_id in [None, Some(food.id)] {
        let data = CreateScanData {
            event_id: event.id,
            veteran_id: vet.id,
            service_id,
            plus_one: false,
            scan_by_id: alice.id,
            scan_date: Utc::now(),
        };

        let first = Scan::insert_if_absent(&mut conn, data.clone())
            .await
            .unwrap()
            .expect("first insert stores the scan");
        let second = Scan::insert_if_absent(
            &mut conn,
            CreateScanData {
                plus_one: true,
                scan_date: Utc::now(),
                ..data
            },
        )
        .await
        .unwrap();
        assert!(second.is_none(), "duplicate stored for {:?}", service_id);

        let stored = Scan::find(&mut conn, event.id, vet.id, service_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, first);
    }

    let filters = ScanFilters {
        event_id: Some(event.id),
        ..Default::default()
    };
    assert_eq!(Scan::list(&mut conn, &filters).await.unwrap().len(), 2);
}
