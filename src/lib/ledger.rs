//! Rider accounts, the bus fleet and the transaction log, held in memory by
//! the fare server.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    form::{self, ValidationError},
    request::RegisterRequest,
};

/// Distance from campus for the towns riders usually live in, in km.
const DISTANCES: [(&str, f64); 5] = [
    ("Kundapura", 30.0),
    ("Udupi", 8.5),
    ("Manipal", 12.0),
    ("Brahmavar", 15.0),
    ("Mangalore", 25.0),
];
const DEFAULT_DISTANCE: f64 = 10.0;

const DEFAULT_PAYMENT_METHOD: &str = "UPI";
const UNKNOWN_LOCATION: &str = "Unknown";
/// The only answer to a boarding notification that claims a seat.
const BOARDING_ACCEPTED: &str = "yes";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    #[error("USN is already registered")]
    DuplicateUsn,
    #[error("Invalid QR code format")]
    InvalidQrFormat,
    #[error("Invalid QR code data")]
    InvalidQrData,
    #[error("User not found")]
    UserNotFound,
    #[error("Bus not found")]
    BusNotFound,
    #[error("Insufficient balance. Required: ₹{required:.2}, Available: ₹{available:.2}")]
    InsufficientBalance { required: f64, available: f64 },
    #[error("Please enter a valid amount greater than 0")]
    InvalidAmount,
    #[error("Please enter a valid number of seats")]
    InvalidSeats,
    #[error("Only {available} seats available")]
    NotEnoughSeats { available: u32 },
    #[error("Sorry, this bus is now full. Please try another alternative.")]
    BusFull,
    #[error("No regular bus is set on your account")]
    NoRegularBus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub usn: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub bus_number: Option<String>,
    pub address: String,
    pub distance_km: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub bus_number: String,
    pub starting_point: String,
    pub ending_point: String,
    pub total_seats: u32,
    pub available_seats: u32,
    pub fare: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub usn: String,
    pub amount: f64,
    pub kind: TransactionKind,
    pub description: String,
    pub bus_number: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

/// What a bus QR code carries once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BusTicket {
    bus_number: String,
    location: String,
}

impl BusTicket {
    /// Codes are printed with Python-style single quotes, so those are
    /// turned into double quotes before parsing.
    fn parse(code: &str) -> Result<Self, LedgerError> {
        let value: Value = serde_json::from_str(&code.replace('\'', "\""))
            .map_err(|_| LedgerError::InvalidQrFormat)?;
        let object = value.as_object().ok_or(LedgerError::InvalidQrData)?;

        let bus_number = match object.get("bus_number") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => integral_number(n),
            _ => return Err(LedgerError::InvalidQrData),
        };
        let location = object
            .get("location")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_LOCATION)
            .to_owned();

        Ok(Self {
            bus_number,
            location,
        })
    }
}

/// `1.0` names the same bus as `1`.
fn integral_number(n: &serde_json::Number) -> String {
    if let Some(n) = n.as_u64() {
        return n.to_string();
    }

    match n.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => format!("{f:.0}"),
        _ => n.to_string(),
    }
}

/// How a boarding notification was answered.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardingReply {
    Confirmed,
    /// The regular bus is full. Holds other buses on the same route that
    /// still have room.
    Full { alternatives: Vec<Bus> },
    Declined,
}

impl BoardingReply {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Confirmed => "Your seat has been confirmed!",
            Self::Full { .. } => "Your regular bus is full. Please select an alternative bus.",
            Self::Declined => "You have declined to board the bus today.",
        }
    }
}

/// The fleet used when the server configuration names no buses.
pub fn default_fleet() -> Vec<Bus> {
    [
        ("1", "Udupi", "Manipal", 40, 20.0),
        ("2", "Kundapura", "Udupi", 45, 35.0),
        ("3", "Mangalore", "Manipal", 50, 45.0),
        ("4", "Brahmavar", "Manipal", 35, 25.0),
    ]
    .into_iter()
    .map(|(number, from, to, seats, fare)| Bus {
        bus_number: number.to_owned(),
        starting_point: from.to_owned(),
        ending_point: to.to_owned(),
        total_seats: seats,
        available_seats: seats,
        fare,
    })
    .collect()
}

/// Guesses how far from campus an address is.
pub fn distance_for(address: &str) -> f64 {
    let address = address.to_lowercase();

    DISTANCES
        .iter()
        .find(|(town, _)| address.contains(&town.to_lowercase()))
        .map_or(DEFAULT_DISTANCE, |(_, km)| *km)
}

#[derive(Debug, Default)]
pub struct Ledger {
    accounts: HashMap<String, Account>,
    buses: HashMap<String, Bus>,
    transactions: Vec<Transaction>,
    next_transaction: u64,
}

impl Ledger {
    /// Creates a [`Ledger`] with the given fleet and no riders.
    pub fn new(fleet: Vec<Bus>) -> Self {
        Self {
            buses: fleet
                .into_iter()
                .map(|bus| (bus.bus_number.clone(), bus))
                .collect(),
            ..Self::default()
        }
    }

    /// Validates a registration form and checks the USN is still free.
    pub fn check_registration(&self, req: &RegisterRequest) -> Result<(), LedgerError> {
        form::check_registration_fields(
            req.usn.trim(),
            &req.password,
            &req.confirm_password,
            req.phone.trim(),
            req.email.trim(),
        )?;

        if self.accounts.contains_key(req.usn.trim()) {
            warn!("USN is already registered");
            return Err(LedgerError::DuplicateUsn);
        }

        Ok(())
    }

    /// Stores a new rider. `password_hash` is kept as given.
    #[instrument(skip(self, req, password_hash), fields(usn = %req.usn))]
    pub fn register(
        &mut self,
        req: RegisterRequest,
        password_hash: String,
    ) -> Result<&Account, LedgerError> {
        self.check_registration(&req)?;

        let usn = req.usn.trim().to_owned();
        let account = Account {
            usn: usn.clone(),
            name: req.name.trim().to_owned(),
            phone: req.phone.trim().to_owned(),
            email: req.email.trim().to_owned(),
            password_hash,
            bus_number: req.bus_number.filter(|b| !b.trim().is_empty()),
            distance_km: distance_for(&req.address),
            address: req.address,
            balance: 0.0,
        };

        info!("registered rider {usn}");

        Ok(self.accounts.entry(usn).or_insert(account))
    }

    pub fn password_hash(&self, usn: &str) -> Option<String> {
        self.accounts.get(usn).map(|a| a.password_hash.clone())
    }

    pub fn account(&self, usn: &str) -> Option<&Account> {
        self.accounts.get(usn)
    }

    /// Credits `amount` and returns the new balance.
    #[instrument(skip(self))]
    pub fn top_up(
        &mut self,
        usn: &str,
        amount: f64,
        payment_method: Option<&str>,
    ) -> Result<f64, LedgerError> {
        if !(amount.is_finite() && amount > 0.0) {
            return Err(LedgerError::InvalidAmount);
        }

        let account = self
            .accounts
            .get_mut(usn)
            .ok_or(LedgerError::UserNotFound)?;
        account.balance += amount;
        let balance = account.balance;

        let method = payment_method.unwrap_or(DEFAULT_PAYMENT_METHOD);
        self.record(
            usn,
            amount,
            TransactionKind::Credit,
            format!("Top up via {method}"),
            "N/A",
            "N/A",
        );

        debug!("balance is now {balance:.2}");

        Ok(balance)
    }

    /// Deducts the fare of the bus named by a scanned code. Returns the
    /// message shown to the rider.
    #[instrument(skip(self))]
    pub fn charge_fare(&mut self, usn: &str, code: &str) -> Result<String, LedgerError> {
        let ticket = BusTicket::parse(code)?;

        let available = self
            .accounts
            .get(usn)
            .ok_or(LedgerError::UserNotFound)?
            .balance;
        let fare = self
            .buses
            .get(&ticket.bus_number)
            .ok_or(LedgerError::BusNotFound)?
            .fare;

        if available < fare {
            debug!("balance {available:.2} does not cover fare {fare:.2}");
            return Err(LedgerError::InsufficientBalance {
                required: fare,
                available,
            });
        }

        if let Some(account) = self.accounts.get_mut(usn) {
            account.balance -= fare;
        }

        self.record(
            usn,
            fare,
            TransactionKind::Debit,
            format!("Bus fare payment - {}", ticket.location),
            &ticket.bus_number,
            &ticket.location,
        );

        info!("charged {fare:.2} for bus {}", ticket.bus_number);

        Ok(format!(
            "Fare of ₹{fare:.2} deducted successfully for Bus {} from {}",
            ticket.bus_number, ticket.location
        ))
    }

    /// The rider's transactions, newest first.
    pub fn transactions(&self, usn: &str) -> Vec<Transaction> {
        self.transactions
            .iter()
            .rev()
            .filter(|t| t.usn == usn)
            .cloned()
            .collect()
    }

    /// Reserves `seats` seats on a bus ahead of boarding.
    #[instrument(skip(self))]
    pub fn book_seats(&mut self, bus_number: &str, seats: i64) -> Result<String, LedgerError> {
        let bus = self
            .buses
            .get_mut(bus_number)
            .ok_or(LedgerError::BusNotFound)?;

        if seats <= 0 {
            return Err(LedgerError::InvalidSeats);
        }

        let available = bus.available_seats;
        let wanted = u32::try_from(seats).map_err(|_| LedgerError::NotEnoughSeats { available })?;
        if wanted > available {
            return Err(LedgerError::NotEnoughSeats { available });
        }

        bus.available_seats -= wanted;
        info!("booked {wanted} seat(s), {} left", bus.available_seats);

        Ok(format!(
            "Successfully booked {seats} seat(s) for Bus {bus_number}! \
             Remember to scan the QR code at the bus stop to pay the fare."
        ))
    }

    /// Answers a boarding notification for the rider's regular bus. A yes
    /// takes one seat, or lists alternatives on the same route when the bus
    /// is full.
    #[instrument(skip(self))]
    pub fn respond(
        &mut self,
        usn: &str,
        notification_id: &str,
        response: &str,
    ) -> Result<BoardingReply, LedgerError> {
        if response != BOARDING_ACCEPTED {
            debug!("rider declined");
            return Ok(BoardingReply::Declined);
        }

        let regular = self
            .accounts
            .get(usn)
            .ok_or(LedgerError::UserNotFound)?
            .bus_number
            .clone()
            .ok_or(LedgerError::NoRegularBus)?;
        let bus = self
            .buses
            .get_mut(&regular)
            .ok_or(LedgerError::BusNotFound)?;

        if bus.available_seats > 0 {
            bus.available_seats -= 1;
            info!("seat confirmed on bus {regular}");
            return Ok(BoardingReply::Confirmed);
        }

        let (from, to) = (bus.starting_point.clone(), bus.ending_point.clone());
        let alternatives: Vec<_> = self
            .available_buses()
            .into_iter()
            .filter(|b| b.bus_number != regular && b.starting_point == from && b.ending_point == to)
            .collect();

        debug!("bus {regular} is full, {} alternatives", alternatives.len());

        Ok(BoardingReply::Full { alternatives })
    }

    /// Takes one seat on a bus picked in place of a full regular one.
    #[instrument(skip(self))]
    pub fn book_alternative(&mut self, bus_number: &str) -> Result<String, LedgerError> {
        let bus = self
            .buses
            .get_mut(bus_number)
            .ok_or(LedgerError::BusNotFound)?;

        if bus.available_seats == 0 {
            return Err(LedgerError::BusFull);
        }

        bus.available_seats -= 1;

        Ok(format!("Successfully booked seat in Bus {bus_number}!"))
    }

    /// Buses with at least one free seat, ordered by bus number.
    pub fn available_buses(&self) -> Vec<Bus> {
        let mut buses: Vec<_> = self
            .buses
            .values()
            .filter(|b| b.available_seats > 0)
            .cloned()
            .collect();
        buses.sort_by(|a, b| a.bus_number.cmp(&b.bus_number));
        buses
    }

    fn record(
        &mut self,
        usn: &str,
        amount: f64,
        kind: TransactionKind,
        description: String,
        bus_number: &str,
        location: &str,
    ) {
        self.next_transaction += 1;
        self.transactions.push(Transaction {
            id: self.next_transaction,
            usn: usn.to_owned(),
            amount,
            kind,
            description,
            bus_number: bus_number.to_owned(),
            location: location.to_owned(),
            created_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USN: &str = "4NM21CS042";

    fn request() -> RegisterRequest {
        RegisterRequest {
            usn: USN.to_owned(),
            name: "Asha Rao".to_owned(),
            phone: "9876543210".to_owned(),
            email: "asha@example.com".to_owned(),
            password: "secret1".to_owned(),
            confirm_password: "secret1".to_owned(),
            bus_number: Some("1".to_owned()),
            address: "12 Temple Road, Udupi".to_owned(),
        }
    }

    const HASH: &str = "100000$c2FsdA==$aGFzaA==";

    fn ledger_with_rider(balance: f64) -> Ledger {
        let mut ledger = Ledger::new(default_fleet());
        ledger.register(request(), HASH.to_owned()).unwrap();
        if balance > 0.0 {
            ledger.top_up(USN, balance, None).unwrap();
        }
        ledger
    }

    #[test]
    fn register_derives_distance_and_starts_empty() {
        let ledger = ledger_with_rider(0.0);
        let account = ledger.account(USN).unwrap();

        assert_eq!(account.distance_km, 8.5);
        assert_eq!(account.balance, 0.0);
        assert_eq!(ledger.password_hash(USN).as_deref(), Some(HASH));
        assert!(ledger.password_hash("0000000000").is_none());
    }

    #[test]
    fn register_rejects_duplicates_and_invalid_forms() {
        let mut ledger = ledger_with_rider(0.0);

        assert!(matches!(
            ledger.register(request(), HASH.to_owned()),
            Err(LedgerError::DuplicateUsn)
        ));

        let mut bad = request();
        bad.usn = "other".to_owned();
        assert!(matches!(
            ledger.register(bad, HASH.to_owned()),
            Err(LedgerError::Invalid(ValidationError::Usn))
        ));
    }

    #[test]
    fn distance_falls_back_to_default() {
        assert_eq!(distance_for("near KUNDAPURA bus stand"), 30.0);
        assert_eq!(distance_for("Bengaluru"), 10.0);
    }

    #[test]
    fn fare_is_deducted_and_recorded() {
        let mut ledger = ledger_with_rider(100.0);

        let message = ledger
            .charge_fare(USN, "{'bus_number': '1', 'location': 'Udupi'}")
            .unwrap();

        assert_eq!(
            message,
            "Fare of ₹20.00 deducted successfully for Bus 1 from Udupi"
        );
        assert_eq!(ledger.account(USN).unwrap().balance, 80.0);

        let history = ledger.transactions(USN);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Debit);
        assert_eq!(history[0].description, "Bus fare payment - Udupi");
        assert_eq!(history[1].description, "Top up via UPI");
    }

    #[test]
    fn numeric_bus_number_and_missing_location() {
        let mut ledger = ledger_with_rider(100.0);

        let message = ledger.charge_fare(USN, r#"{"bus_number": 2}"#).unwrap();

        assert_eq!(
            message,
            "Fare of ₹35.00 deducted successfully for Bus 2 from Unknown"
        );
    }

    #[test]
    fn integral_float_bus_number_names_the_bus() {
        let mut ledger = ledger_with_rider(100.0);

        let message = ledger.charge_fare(USN, r#"{"bus_number": 1.0}"#).unwrap();

        assert_eq!(
            message,
            "Fare of ₹20.00 deducted successfully for Bus 1 from Unknown"
        );
        assert!(matches!(
            ledger.charge_fare(USN, r#"{"bus_number": 1.5}"#),
            Err(LedgerError::BusNotFound)
        ));
    }

    #[test]
    fn insufficient_balance_leaves_balance_alone() {
        let mut ledger = ledger_with_rider(10.0);

        let err = ledger
            .charge_fare(USN, "{'bus_number': '1'}")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Insufficient balance. Required: ₹20.00, Available: ₹10.00"
        );
        assert_eq!(ledger.account(USN).unwrap().balance, 10.0);
        assert_eq!(ledger.transactions(USN).len(), 1);
    }

    #[test]
    fn bad_codes_are_rejected() {
        let mut ledger = ledger_with_rider(100.0);

        assert!(matches!(
            ledger.charge_fare(USN, "BUS-1"),
            Err(LedgerError::InvalidQrFormat)
        ));
        assert!(matches!(
            ledger.charge_fare(USN, "[1, 2]"),
            Err(LedgerError::InvalidQrData)
        ));
        assert!(matches!(
            ledger.charge_fare(USN, "{'location': 'Udupi'}"),
            Err(LedgerError::InvalidQrData)
        ));
        assert!(matches!(
            ledger.charge_fare(USN, "{'bus_number': '99'}"),
            Err(LedgerError::BusNotFound)
        ));
        assert!(matches!(
            ledger.charge_fare("1AA00AA000", "{'bus_number': '1'}"),
            Err(LedgerError::UserNotFound)
        ));
    }

    #[test]
    fn top_up_rejects_non_positive_amounts() {
        let mut ledger = ledger_with_rider(0.0);

        for amount in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                ledger.top_up(USN, amount, Some("Card")),
                Err(LedgerError::InvalidAmount)
            ));
        }

        assert_eq!(ledger.top_up(USN, 10.5, Some("Card")).unwrap(), 10.5);
        assert_eq!(ledger.transactions(USN)[0].description, "Top up via Card");
    }

    #[test]
    fn only_buses_with_seats_are_listed() {
        let mut fleet = default_fleet();
        fleet[0].available_seats = 0;
        let ledger = Ledger::new(fleet);

        let numbers: Vec<_> = ledger
            .available_buses()
            .into_iter()
            .map(|b| b.bus_number)
            .collect();

        assert_eq!(numbers, vec!["2", "3", "4"]);
    }

    fn seats_left(ledger: &Ledger, bus_number: &str) -> u32 {
        ledger.buses[bus_number].available_seats
    }

    #[test]
    fn booking_takes_the_requested_seats() {
        let mut ledger = Ledger::new(default_fleet());

        let message = ledger.book_seats("4", 5).unwrap();

        assert_eq!(
            message,
            "Successfully booked 5 seat(s) for Bus 4! \
             Remember to scan the QR code at the bus stop to pay the fare."
        );
        assert_eq!(seats_left(&ledger, "4"), 30);
    }

    #[test]
    fn booking_checks_the_bus_and_seat_count() {
        let mut ledger = Ledger::new(default_fleet());

        assert!(matches!(ledger.book_seats("9", 1), Err(LedgerError::BusNotFound)));
        for seats in [0, -3] {
            assert!(matches!(
                ledger.book_seats("4", seats),
                Err(LedgerError::InvalidSeats)
            ));
        }

        let err = ledger.book_seats("4", 36).unwrap_err();
        assert_eq!(err.to_string(), "Only 35 seats available");
        assert!(matches!(
            ledger.book_seats("4", i64::MAX),
            Err(LedgerError::NotEnoughSeats { available: 35 })
        ));
        assert_eq!(seats_left(&ledger, "4"), 35);
    }

    #[test]
    fn accepting_a_notification_takes_one_seat() {
        let mut ledger = ledger_with_rider(0.0);

        let reply = ledger.respond(USN, "7", "yes").unwrap();

        assert_eq!(reply, BoardingReply::Confirmed);
        assert_eq!(reply.message(), "Your seat has been confirmed!");
        assert_eq!(seats_left(&ledger, "1"), 39);
    }

    #[test]
    fn declining_leaves_seats_alone() {
        let mut ledger = ledger_with_rider(0.0);

        let reply = ledger.respond(USN, "7", "no").unwrap();

        assert_eq!(reply.message(), "You have declined to board the bus today.");
        assert_eq!(seats_left(&ledger, "1"), 40);
    }

    #[test]
    fn full_regular_bus_offers_same_route_alternatives() {
        let mut fleet = default_fleet();
        fleet[0].available_seats = 0;
        let full = fleet[0].clone();
        fleet.push(Bus {
            bus_number: "5".to_owned(),
            ..full.clone()
        });
        fleet.push(Bus {
            bus_number: "6".to_owned(),
            available_seats: 10,
            ..full
        });
        let mut ledger = Ledger::new(fleet);
        ledger.register(request(), HASH.to_owned()).unwrap();

        let reply = ledger.respond(USN, "7", "yes").unwrap();

        let BoardingReply::Full { alternatives } = reply else {
            panic!("expected alternatives, got {reply:?}");
        };
        let numbers: Vec<_> = alternatives.iter().map(|b| b.bus_number.as_str()).collect();
        assert_eq!(numbers, vec!["6"]);
    }

    #[test]
    fn accepting_without_a_regular_bus_fails() {
        let mut ledger = Ledger::new(default_fleet());
        let mut req = request();
        req.bus_number = None;
        ledger.register(req, HASH.to_owned()).unwrap();

        assert!(matches!(
            ledger.respond(USN, "7", "yes"),
            Err(LedgerError::NoRegularBus)
        ));
    }

    #[test]
    fn alternative_booking_needs_a_free_seat() {
        let mut fleet = default_fleet();
        fleet[1].available_seats = 1;
        let mut ledger = Ledger::new(fleet);

        assert_eq!(
            ledger.book_alternative("2").unwrap(),
            "Successfully booked seat in Bus 2!"
        );
        assert!(matches!(ledger.book_alternative("2"), Err(LedgerError::BusFull)));
        assert!(matches!(
            ledger.book_alternative("9"),
            Err(LedgerError::BusNotFound)
        ));
    }
}
