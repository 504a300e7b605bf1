//! End-to-end rule scenarios for the allocation ledger and the cash order
//! hold, exercised through the public domain API (no database required).

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use boxoffice_server::models::{
    CommissionType, Order, OrderStatus, StaffAllocation, StaffIdentity, StaffRole,
};
use boxoffice_server::services::commission::commission_cents;
use boxoffice_server::utils::error::AppError;

fn staff_identity(event_id: Uuid, organizer_id: Uuid, role: StaffRole) -> StaffIdentity {
    StaffIdentity {
        id: Uuid::new_v4(),
        event_id,
        organizer_id,
        staff_user_id: Some(Uuid::new_v4()),
        role,
        assigned_by_staff_id: None,
        accept_cash_in_person: true,
        commission_type: CommissionType::None,
        commission_value: Decimal::ZERO,
        tickets_sold: 0,
        cash_collected_cents: 0,
        commission_earned_cents: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn allocation(staff: &StaffIdentity, tier_id: Uuid, allocated: i32) -> StaffAllocation {
    StaffAllocation {
        id: Uuid::new_v4(),
        staff_id: staff.id,
        event_id: staff.event_id,
        tier_id,
        allocated_quantity: allocated,
        sold_quantity: 0,
        remaining_quantity: allocated,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn team_member_transfers_down_the_hierarchy() {
    let event_id = Uuid::new_v4();
    let organizer_id = Uuid::new_v4();
    let tier_id = Uuid::new_v4();

    let team_member = staff_identity(event_id, organizer_id, StaffRole::TeamMember);
    let mut associate_b = staff_identity(event_id, organizer_id, StaffRole::Associate);
    associate_b.assigned_by_staff_id = Some(team_member.id);
    let associate_c = staff_identity(event_id, organizer_id, StaffRole::Associate);

    // Organizer allocated 100 units of the tier to the team member.
    let mut a_ledger = allocation(&team_member, tier_id, 100);
    let mut b_ledger = allocation(&associate_b, tier_id, 0);

    // Transfer 30 to associate B, assigned by the team member.
    team_member.ensure_assigned(&associate_b).unwrap();
    a_ledger.release(30).unwrap();
    b_ledger.grant(30);

    assert_eq!(a_ledger.remaining_quantity, 70);
    assert_eq!(b_ledger.remaining_quantity, 30);
    assert_eq!(
        a_ledger.allocated_quantity + b_ledger.allocated_quantity,
        100,
        "transfer must be zero-sum across the tier"
    );

    // Associate C was never assigned by the team member.
    assert!(matches!(
        team_member.ensure_assigned(&associate_c),
        Err(AppError::NotYourAssociate)
    ));
}

#[test]
fn transfer_never_crosses_event_boundaries() {
    let organizer_id = Uuid::new_v4();
    let team_member = staff_identity(Uuid::new_v4(), organizer_id, StaffRole::TeamMember);

    // An associate on a different event, but assigned by this team member.
    // Assignment alone must not be enough to receive a transfer.
    let mut foreign_associate =
        staff_identity(Uuid::new_v4(), organizer_id, StaffRole::Associate);
    foreign_associate.assigned_by_staff_id = Some(team_member.id);

    assert!(team_member.ensure_assigned(&foreign_associate).is_ok());
    assert!(matches!(
        team_member.ensure_same_event(&foreign_associate),
        Err(AppError::TierMismatch)
    ));

    // The same associate on the team member's own event passes both gates.
    foreign_associate.event_id = team_member.event_id;
    assert!(team_member.ensure_same_event(&foreign_associate).is_ok());
}

#[test]
fn sale_rejection_leaves_the_ledger_untouched() {
    let event_id = Uuid::new_v4();
    let organizer_id = Uuid::new_v4();
    let staff = staff_identity(event_id, organizer_id, StaffRole::Staff);
    let mut ledger = allocation(&staff, Uuid::new_v4(), 5);

    ledger.consume(4).unwrap();
    let err = ledger.consume(2).unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientAllocation {
            requested: 2,
            remaining: 1
        }
    ));
    assert_eq!(ledger.sold_quantity, 4);
    assert_eq!(ledger.remaining_quantity, 1);
    assert!(ledger.invariant_holds());
}

#[test]
fn cash_hold_gates_both_fulfillment_paths() {
    let now = Utc::now();
    let mut order = Order {
        id: Uuid::new_v4(),
        event_id: Uuid::new_v4(),
        order_number: "CSH-20260826-0A0B".to_string(),
        guest_contact_id: Uuid::new_v4(),
        status: OrderStatus::PendingCashPayment,
        subtotal_cents: 5000,
        platform_fee_cents: 0,
        processing_fee_cents: 0,
        total_cents: 5000,
        payment_method: "cash_in_person".to_string(),
        hold_expires_at: Some(now + Duration::minutes(30)),
        approved_by_staff_id: None,
        sold_by_staff_id: None,
        staff_commission_cents: 0,
        paid_at: None,
        created_at: now,
        updated_at: now,
    };

    // Inside the hold window the staff paths are open.
    assert!(order.ensure_awaiting_cash(now).is_ok());
    assert_eq!(order.time_remaining_secs(now), 30 * 60);

    // Issuing a code moves the order out of reach of the approve path.
    order.status = OrderStatus::CodeIssued;
    assert!(matches!(
        order.ensure_awaiting_cash(now),
        Err(AppError::InvalidStatus(_))
    ));
    assert!(order.ensure_awaiting_activation(now).is_ok());

    // Once completed, neither path may fire again.
    order.status = OrderStatus::Completed;
    assert!(order.ensure_awaiting_cash(now).is_err());
    assert!(order.ensure_awaiting_activation(now).is_err());

    // Expiry is wall-clock: an overdue pending order is unusable even if the
    // sweep has not flipped it yet.
    order.status = OrderStatus::PendingCashPayment;
    let late = now + Duration::minutes(31);
    assert!(matches!(
        order.ensure_awaiting_cash(late),
        Err(AppError::OrderExpired)
    ));
}

#[test]
fn staff_without_cash_acceptance_cannot_approve() {
    let mut staff = staff_identity(Uuid::new_v4(), Uuid::new_v4(), StaffRole::Staff);
    staff.accept_cash_in_person = false;
    assert!(matches!(
        staff.ensure_accepts_cash(),
        Err(AppError::StaffNotAuthorized)
    ));
}

#[test]
fn commission_matches_published_examples() {
    // $3.00 fixed per ticket, 4 tickets.
    assert_eq!(
        commission_cents(CommissionType::Fixed, Decimal::from(300), 10_000, 4),
        1200
    );
    // 10% of a $50.00 subtotal.
    assert_eq!(
        commission_cents(CommissionType::Percentage, Decimal::from(10), 5000, 2),
        500
    );
}

#[test]
fn order_statuses_serialize_in_wire_form() {
    let json = serde_json::to_string(&OrderStatus::PendingCashPayment).unwrap();
    assert_eq!(json, "\"PENDING_CASH_PAYMENT\"");
    let json = serde_json::to_string(&OrderStatus::CodeIssued).unwrap();
    assert_eq!(json, "\"CODE_ISSUED\"");
}
