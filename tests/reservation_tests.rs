//! Pruebas del gestor de reservas.
//!
//! La expiración compara reloj de pared contra `expires_at`, así que
//! estas pruebas usan holds cortos y tiempo real en vez del reloj
//! pausado de tokio.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use common::MockReservationApi;
use ride_session::{
    CoreError, Reservation, ReservationEvent, ReservationManager, ReservationStatus, StatusHint,
    UnitStatus,
};
use uuid::Uuid;

fn manager_with_hold(hold_ms: i64) -> (Arc<MockReservationApi>, ReservationManager<MockReservationApi>) {
    let api = Arc::new(MockReservationApi::new(hold_ms));
    let manager = ReservationManager::new(api.clone())
        .with_watch_interval(Duration::from_millis(20));
    (api, manager)
}

#[tokio::test]
async fn at_most_one_active_reservation() {
    let (_api, manager) = manager_with_hold(10 * 60 * 1000);
    let vehicle = Uuid::new_v4();

    let first = manager.create_reservation(vehicle).await.unwrap();
    assert_eq!(first.status, ReservationStatus::Active);

    // la segunda petición siempre es un rechazo, venga del chequeo
    // optimista local o del servidor
    let err = manager.create_reservation(vehicle).await.unwrap_err();
    assert!(matches!(err, CoreError::ReservationAlreadyActive));
}

#[test]
fn expiry_monotonicity_for_arbitrary_hold_and_origin() {
    // activa en [t0, t0+D), nunca usable desde t0+D, para varios D
    for hold_minutes in [1i64, 5, 10, 30] {
        let r = Reservation::new_active(Uuid::new_v4(), Uuid::new_v4(), None, hold_minutes);
        let t0 = r.created_at;
        let d = ChronoDuration::minutes(hold_minutes);

        assert!(r.is_active_at(t0));
        assert!(r.is_active_at(t0 + d - ChronoDuration::seconds(1)));
        assert!(!r.is_active_at(t0 + d));
        assert!(!r.is_active_at(t0 + d + ChronoDuration::seconds(1)));
        assert!(!r.is_active_at(t0 + d + ChronoDuration::hours(2)));
    }
}

#[tokio::test]
async fn watch_expires_reservation_and_notifies() {
    let (_api, manager) = manager_with_hold(150);
    let mut events = manager.subscribe();

    let reservation = manager.create_reservation(Uuid::new_v4()).await.unwrap();
    assert!(manager.get_active_reservation().await.is_some());

    tokio::time::sleep(Duration::from_millis(400)).await;

    // la vigilancia local expiró la reserva y avisó a la UI con la
    // reserva completa, comparable por valor
    assert!(manager.get_active_reservation().await.is_none());
    let mut expected = reservation;
    expected.status = ReservationStatus::Expired;
    assert_eq!(events.recv().await, Some(ReservationEvent::Expired(expected)));
}

#[tokio::test]
async fn use_after_expiry_is_refused_before_reaching_the_server() {
    // hold vencido justo antes de "usar" mientras el usuario navegaba
    let (api, manager) = manager_with_hold(80);
    let reservation = manager.create_reservation(Uuid::new_v4()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = manager.use_reservation(reservation.id).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::ReservationExpired(_) | CoreError::ReservationNotActive(_)
    ));
    // la revalidación de frescura corta antes de la llamada remota
    assert_eq!(api.use_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn use_consumes_exactly_once() {
    let (api, manager) = manager_with_hold(10 * 60 * 1000);
    let reservation = manager.create_reservation(Uuid::new_v4()).await.unwrap();

    let used = manager.use_reservation(reservation.id).await.unwrap();
    assert_eq!(used.status, ReservationStatus::Used);
    assert_eq!(api.use_calls.load(Ordering::SeqCst), 1);

    // consumida: ya no hay activa y un segundo use es un error
    assert!(manager.get_active_reservation().await.is_none());
    assert!(manager.use_reservation(reservation.id).await.is_err());
}

#[tokio::test]
async fn cancel_frees_unit_with_an_optimistic_hint() {
    let (api, manager) = manager_with_hold(10 * 60 * 1000);
    let reservation = manager.create_reservation(Uuid::new_v4()).await.unwrap();
    let unit_id = reservation.unit_id.unwrap();

    manager.cancel_reservation(reservation.id).await.unwrap();
    assert_eq!(api.cancel_calls.load(Ordering::SeqCst), 1);
    assert!(manager.get_active_reservation().await.is_none());

    // pista optimista sin confirmar hasta la siguiente lectura
    let (hinted_unit, hint) = manager.unit_status_hint().unwrap();
    assert_eq!(hinted_unit, unit_id);
    assert_eq!(hint, StatusHint::Hint(UnitStatus::Available));
    assert!(!hint.is_confirmed());

    manager.reconcile_unit_status(unit_id, UnitStatus::Available);
    let (_, reconciled) = manager.unit_status_hint().unwrap();
    assert!(reconciled.is_confirmed());
}

#[tokio::test]
async fn cancel_of_non_active_reservation_is_an_error() {
    let (_api, manager) = manager_with_hold(10 * 60 * 1000);
    let err = manager.cancel_reservation(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CoreError::ReservationNotActive(_)));
}

#[tokio::test]
async fn refusal_reasons_are_distinct() {
    let (api, manager) = manager_with_hold(10 * 60 * 1000);
    api.refuse_creates();

    // "sin unidades" se distingue de "ya tienes una reserva"
    let err = manager.create_reservation(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CoreError::NoUnitsAvailable(_)));
    assert_ne!(
        err.user_message(),
        CoreError::ReservationAlreadyActive.user_message()
    );
}

#[tokio::test]
async fn refresh_reconciles_with_server_state() {
    let (api, manager) = manager_with_hold(10 * 60 * 1000);
    let reservation = manager.create_reservation(Uuid::new_v4()).await.unwrap();

    // el servidor pierde la reserva (p.ej. cancelada desde otro device)
    api.active.lock().unwrap().take();
    let refreshed = manager.refresh_from_server().await.unwrap();
    assert!(refreshed.is_none());
    assert!(manager.get_active_reservation().await.is_none());

    let _ = reservation;
}

#[tokio::test]
async fn teardown_stops_the_watch_and_clears_state() {
    let (_api, manager) = manager_with_hold(10 * 60 * 1000);
    manager.create_reservation(Uuid::new_v4()).await.unwrap();

    manager.teardown().await;
    assert!(manager.get_active_reservation().await.is_none());

    // doble teardown: no-op
    manager.teardown().await;
}
