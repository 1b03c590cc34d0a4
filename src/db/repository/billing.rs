use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{format_timestamp, parse_opt_uuid, parse_timestamp, parse_uuid};
use crate::db::DatabaseError;
use crate::models::*;

// ═══════════════════════════════════════════
// Billing
// ═══════════════════════════════════════════

struct BillingRow {
    id: String,
    patient_id: String,
    total_amount_minor: i64,
    payment_status: String,
    date_issued: String,
    payment_date: Option<String>,
}

fn billing_row(row: &Row<'_>) -> rusqlite::Result<BillingRow> {
    Ok(BillingRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        total_amount_minor: row.get(2)?,
        payment_status: row.get(3)?,
        date_issued: row.get(4)?,
        payment_date: row.get(5)?,
    })
}

fn billing_from_row(row: BillingRow) -> Result<Billing, DatabaseError> {
    Ok(Billing {
        id: parse_uuid("billing.id", &row.id)?,
        patient_id: parse_uuid("billing.patient_id", &row.patient_id)?,
        total_amount: Amount::from_minor(row.total_amount_minor),
        payment_status: PaymentStatus::from_str(&row.payment_status)?,
        date_issued: parse_timestamp("billing.date_issued", &row.date_issued)?,
        payment_date: row
            .payment_date
            .map(|d| parse_timestamp("billing.payment_date", &d))
            .transpose()?,
    })
}

pub fn insert_billing(conn: &Connection, billing: &Billing) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO billing (id, patient_id, total_amount_minor, payment_status, date_issued, payment_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            billing.id.to_string(),
            billing.patient_id.to_string(),
            billing.total_amount.minor_units(),
            billing.payment_status.as_str(),
            format_timestamp(&billing.date_issued),
            billing.payment_date.as_ref().map(format_timestamp),
        ],
    )?;
    Ok(())
}

pub fn get_billing(conn: &Connection, id: &Uuid) -> Result<Option<Billing>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, patient_id, total_amount_minor, payment_status, date_issued, payment_date
         FROM billing WHERE id = ?1",
        params![id.to_string()],
        billing_row,
    );
    match result {
        Ok(row) => Ok(Some(billing_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_billing_for_patient(conn: &Connection, patient_id: &Uuid) -> Result<Vec<Billing>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, total_amount_minor, payment_status, date_issued, payment_date
         FROM billing WHERE patient_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], billing_row)?;

    let mut bills = Vec::new();
    for row in rows {
        bills.push(billing_from_row(row?)?);
    }
    Ok(bills)
}

/// Pending → Paid. Returns false if the row was already paid or missing.
pub fn mark_billing_paid(
    conn: &Connection,
    id: &Uuid,
    paid_at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE billing SET payment_status = 'paid', payment_date = ?2
         WHERE id = ?1 AND payment_status = 'pending'",
        params![id.to_string(), format_timestamp(paid_at)],
    )?;
    Ok(updated > 0)
}

// ═══════════════════════════════════════════
// Payments
// ═══════════════════════════════════════════

struct PaymentRow {
    id: String,
    appointment_id: Option<String>,
    amount_minor: i64,
    external_charge_id: String,
    timestamp: String,
}

fn payment_from_row(row: PaymentRow) -> Result<Payment, DatabaseError> {
    Ok(Payment {
        id: parse_uuid("payments.id", &row.id)?,
        appointment_id: parse_opt_uuid("payments.appointment_id", row.appointment_id)?,
        amount: Amount::from_minor(row.amount_minor),
        external_charge_id: row.external_charge_id,
        timestamp: parse_timestamp("payments.timestamp", &row.timestamp)?,
    })
}

pub fn insert_payment(conn: &Connection, payment: &Payment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO payments (id, appointment_id, amount_minor, external_charge_id, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            payment.id.to_string(),
            payment.appointment_id.map(|id| id.to_string()),
            payment.amount.minor_units(),
            payment.external_charge_id,
            format_timestamp(&payment.timestamp),
        ],
    )?;
    Ok(())
}

pub fn list_payments_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<Payment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, appointment_id, amount_minor, external_charge_id, timestamp
         FROM payments WHERE appointment_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], |row| {
        Ok(PaymentRow {
            id: row.get(0)?,
            appointment_id: row.get(1)?,
            amount_minor: row.get(2)?,
            external_charge_id: row.get(3)?,
            timestamp: row.get(4)?,
        })
    })?;

    let mut payments = Vec::new();
    for row in rows {
        payments.push(payment_from_row(row?)?);
    }
    Ok(payments)
}

pub fn count_payments(conn: &Connection) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))?;
    Ok(count)
}
