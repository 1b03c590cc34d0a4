//! Billing records and the payment ledger.
//!
//! A `Payment` row exists only for a charge the gateway accepted. The charge
//! happens first; on failure nothing is written and any bill stays pending.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{require_patient, Actor};
use crate::db::repository::{
    get_appointment, get_appointment_for_patient, get_billing, insert_billing, insert_payment,
    list_billing_for_patient, list_payments_for_appointment, mark_billing_paid, now_timestamp,
};
use crate::error::{HospitalError, HospitalResult};
use crate::models::{Amount, Billing, Payment, PaymentStatus, Role};
use crate::payment_gateway::{ChargeRequest, PaymentGateway};

#[derive(Debug, Clone, Deserialize)]
pub struct NewBilling {
    pub patient_id: Uuid,
    pub total_amount: Amount,
}

/// Issue a pending bill to a patient. Admin only.
pub fn create_billing(conn: &Connection, actor: &Actor, new: NewBilling) -> HospitalResult<Billing> {
    actor.require_role(Role::Admin)?;
    if !new.total_amount.is_positive() {
        return Err(HospitalError::validation("amount must be greater than zero"));
    }
    require_patient(conn, &new.patient_id)?;

    let billing = Billing {
        id: Uuid::new_v4(),
        patient_id: new.patient_id,
        total_amount: new.total_amount,
        payment_status: PaymentStatus::Pending,
        date_issued: now_timestamp(),
        payment_date: None,
    };
    insert_billing(conn, &billing)?;
    tracing::info!(billing_id = %billing.id, amount = %billing.total_amount, "Billing issued");
    Ok(billing)
}

/// The acting patient's bills in issue order.
pub fn list_billing(conn: &Connection, actor: &Actor) -> HospitalResult<Vec<Billing>> {
    actor.require_role(Role::Patient)?;
    Ok(list_billing_for_patient(conn, &actor.identity_id)?)
}

/// Write the ledger row for a charge the gateway already accepted.
pub fn record_payment(
    conn: &Connection,
    appointment_id: &Uuid,
    amount: Amount,
    external_charge_id: &str,
) -> HospitalResult<Payment> {
    let payment = Payment {
        id: Uuid::new_v4(),
        appointment_id: Some(*appointment_id),
        amount,
        external_charge_id: external_charge_id.to_string(),
        timestamp: now_timestamp(),
    };
    insert_payment(conn, &payment)?;
    Ok(payment)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayRequest {
    pub amount: Amount,
    pub payment_token: String,
    #[serde(default)]
    pub billing_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub billing: Option<Billing>,
}

/// Charge the patient for one of their appointments, optionally settling a
/// bill. A bill settles only on a charge for its exact total. Everything is
/// checked before the gateway is called.
pub fn pay_appointment(
    conn: &Connection,
    gateway: &dyn PaymentGateway,
    actor: &Actor,
    appointment_id: &Uuid,
    req: PayRequest,
) -> HospitalResult<PaymentOutcome> {
    actor.require_role(Role::Patient)?;
    let appointment = get_appointment_for_patient(conn, appointment_id, &actor.identity_id)?
        .ok_or(HospitalError::NotFound("Appointment"))?;
    if !req.amount.is_positive() {
        return Err(HospitalError::validation("amount must be greater than zero"));
    }
    if req.payment_token.trim().is_empty() {
        return Err(HospitalError::validation("payment token is required"));
    }

    let billing = match &req.billing_id {
        Some(id) => {
            let billing = get_billing(conn, id)?
                .filter(|b| b.patient_id == actor.identity_id)
                .ok_or(HospitalError::NotFound("Billing"))?;
            if billing.payment_status == PaymentStatus::Paid {
                return Err(HospitalError::validation("bill is already paid"));
            }
            if req.amount != billing.total_amount {
                return Err(HospitalError::validation(format!(
                    "amount {} does not match bill total {}",
                    req.amount, billing.total_amount
                )));
            }
            Some(billing)
        }
        None => None,
    };

    let receipt = gateway
        .charge(&ChargeRequest {
            amount: req.amount,
            description: format!("Appointment {}", appointment.id),
            source: req.payment_token,
        })
        .map_err(|e| {
            tracing::warn!(appointment_id = %appointment.id, error = %e, "Charge failed");
            HospitalError::PaymentGateway(e.to_string())
        })?;

    let tx = conn.unchecked_transaction()?;
    let payment = record_payment(&tx, &appointment.id, req.amount, &receipt.charge_id)?;
    let billing = match billing {
        Some(mut billing) => {
            let paid_at = payment.timestamp;
            if !mark_billing_paid(&tx, &billing.id, &paid_at)? {
                tracing::warn!(billing_id = %billing.id, "Bill was settled concurrently");
            }
            billing.payment_status = PaymentStatus::Paid;
            billing.payment_date = Some(paid_at);
            Some(billing)
        }
        None => None,
    };
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        payment_id = %payment.id,
        amount = %payment.amount,
        "Payment recorded"
    );
    Ok(PaymentOutcome { payment, billing })
}

/// Payments for an appointment. Visible to admins and the owning patient.
pub fn list_payments(conn: &Connection, actor: &Actor, appointment_id: &Uuid) -> HospitalResult<Vec<Payment>> {
    actor.require_any(&[Role::Patient, Role::Admin])?;
    let appointment = get_appointment(conn, appointment_id)?
        .filter(|a| actor.is(Role::Admin) || a.patient_id == actor.identity_id)
        .ok_or(HospitalError::NotFound("Appointment"))?;
    Ok(list_payments_for_appointment(conn, &appointment.id)?)
}
