//! # Transaction Type Taxonomy
//!
//! The closed set of transaction kinds and the per-kind effect descriptor.
//!
//! ## Design: One Lookup Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Taxonomy Dispatch                               │
//! │                                                                     │
//! │  TransactionType::from_code(3)                                      │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  TransactionType::Purchase ──► profile() ──► EffectProfile {        │
//! │                                   category:     Basic,              │
//! │                                   party_sign:   +1,                 │
//! │                                   cash_sign:    -1,                 │
//! │                                   stock_sign:   +1,                 │
//! │                                   price_update: Accumulate,         │
//! │                                 }                                   │
//! │                                                                     │
//! │  The effect calculator consults this ONE table. No other module     │
//! │  matches on transaction types to decide signs.                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stable Codes
//! The integer codes are persisted in the database and exchanged with the
//! server. Existing codes must never be renumbered; new kinds get new codes.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Category
// =============================================================================

/// Coarse grouping of transaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Sale, Purchase, Returns, Orders, Quotation, Manufacture.
    Basic,
    /// Pay/Get cash against a party, investment deposit/withdraw.
    CashPayment,
    /// Expense and Extra Income.
    ExpenseIncome,
    /// Stock increase/reduce/transfer.
    StockAdjustment,
    /// Meetings, tasks, notes, reminders. Never touches a balance.
    Record,
    /// Payment Transfer, Journal Voucher.
    Other,
}

// =============================================================================
// Transaction Type
// =============================================================================

/// Every transaction kind the engine understands.
///
/// ## Dual Identity
/// - Enum variant: used throughout the Rust code
/// - `i64` code: persisted in SQLite and in sync payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i64)]
#[serde(into = "i64", try_from = "i64")]
pub enum TransactionType {
    Sale = 1,
    SaleOrder = 2,
    Purchase = 3,
    PayToVendor = 4,
    GetFromVendor = 5,
    PayToCustomer = 6,
    GetFromCustomer = 7,
    Expense = 8,
    ExtraIncome = 9,
    PaymentTransfer = 10,
    InvestmentDeposit = 11,
    InvestmentWithdraw = 12,
    StockTransfer = 13,
    StockIncrease = 14,
    StockReduce = 15,
    Manufacture = 16,
    CustomerReturn = 17,
    VendorReturn = 18,
    JournalVoucher = 19,
    Quotation = 20,
    Meeting = 21,
    Task = 22,
    ClientNote = 23,
    SelfNote = 24,
    CashReminder = 25,
    PurchaseOrder = 26,
    StockAdjustment = 27,
}

// =============================================================================
// Effect Profile
// =============================================================================

/// How the weighted-average purchase price reacts to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceUpdate {
    /// Blend new units into the average: `(q1*p1 + q2*p2) / (q1 + q2)`.
    Accumulate,
    /// Remove units from the average: `(q1*p1 - q2*p2) / (q1 - q2)`.
    Decumulate,
}

/// The effect descriptor for one transaction kind.
///
/// Signs are multipliers applied by the effect calculator:
/// - `party_sign` × (grand_total − total_paid) → party balance delta
/// - `cash_sign` × total_paid → payment method delta
/// - `stock_sign` × line quantity → warehouse stock delta
///
/// A sign of 0 means the kind never touches that balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectProfile {
    pub category: Category,
    pub affects_stock: bool,
    pub requires_party: bool,
    pub party_sign: f64,
    pub cash_sign: f64,
    pub stock_sign: f64,
    pub price_update: Option<PriceUpdate>,
}

impl EffectProfile {
    const fn zero(category: Category, requires_party: bool) -> Self {
        EffectProfile {
            category,
            affects_stock: false,
            requires_party,
            party_sign: 0.0,
            cash_sign: 0.0,
            stock_sign: 0.0,
            price_update: None,
        }
    }
}

impl TransactionType {
    /// Resolves a persisted/remote integer code.
    ///
    /// Unknown codes are an error, never a silent no-op.
    pub fn from_code(code: i64) -> CoreResult<Self> {
        use TransactionType::*;
        Ok(match code {
            1 => Sale,
            2 => SaleOrder,
            3 => Purchase,
            4 => PayToVendor,
            5 => GetFromVendor,
            6 => PayToCustomer,
            7 => GetFromCustomer,
            8 => Expense,
            9 => ExtraIncome,
            10 => PaymentTransfer,
            11 => InvestmentDeposit,
            12 => InvestmentWithdraw,
            13 => StockTransfer,
            14 => StockIncrease,
            15 => StockReduce,
            16 => Manufacture,
            17 => CustomerReturn,
            18 => VendorReturn,
            19 => JournalVoucher,
            20 => Quotation,
            21 => Meeting,
            22 => Task,
            23 => ClientNote,
            24 => SelfNote,
            25 => CashReminder,
            26 => PurchaseOrder,
            27 => StockAdjustment,
            other => return Err(CoreError::UnknownTransactionType(other)),
        })
    }

    /// The stable integer code for persistence and sync payloads.
    #[inline]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Human-readable name, used in logs and progress labels.
    pub const fn display_name(self) -> &'static str {
        use TransactionType::*;
        match self {
            Sale => "Sale",
            SaleOrder => "Sale Order",
            Purchase => "Purchase",
            PayToVendor => "Pay Payment to Vendor",
            GetFromVendor => "Get Payment from Vendor",
            PayToCustomer => "Pay Payment to Customer",
            GetFromCustomer => "Get Payment from Customer",
            Expense => "Expense",
            ExtraIncome => "Extra Income",
            PaymentTransfer => "Payment Transfer",
            InvestmentDeposit => "Investment Deposit",
            InvestmentWithdraw => "Investment Withdraw",
            StockTransfer => "Stock Transfer",
            StockIncrease => "Stock Increase",
            StockReduce => "Stock Reduce",
            Manufacture => "Manufacture",
            CustomerReturn => "Customer Return",
            VendorReturn => "Vendor Return",
            JournalVoucher => "Journal Voucher",
            Quotation => "Quotation",
            Meeting => "Meeting",
            Task => "Task",
            ClientNote => "Client Note",
            SelfNote => "Self Note",
            CashReminder => "Cash Reminder",
            PurchaseOrder => "Purchase Order",
            StockAdjustment => "Stock Adjustment",
        }
    }

    /// The one effect lookup table.
    ///
    /// All sign decisions for party balance, payment method amount, stock
    /// quantity and average purchase price live here and nowhere else.
    pub const fn profile(self) -> EffectProfile {
        use Category::*;
        use TransactionType::*;
        match self {
            // Revenue-like: the counterparty owes less afterwards.
            Sale => EffectProfile {
                category: Basic,
                affects_stock: true,
                requires_party: true,
                party_sign: -1.0,
                cash_sign: 1.0,
                stock_sign: -1.0,
                price_update: None,
            },
            GetFromCustomer => EffectProfile {
                category: CashPayment,
                affects_stock: false,
                requires_party: true,
                party_sign: -1.0,
                cash_sign: 1.0,
                stock_sign: 0.0,
                price_update: None,
            },
            GetFromVendor => EffectProfile {
                category: CashPayment,
                affects_stock: false,
                requires_party: true,
                party_sign: -1.0,
                cash_sign: 1.0,
                stock_sign: 0.0,
                price_update: None,
            },
            VendorReturn => EffectProfile {
                category: Basic,
                affects_stock: true,
                requires_party: true,
                party_sign: -1.0,
                cash_sign: 1.0,
                stock_sign: -1.0,
                price_update: Some(PriceUpdate::Decumulate),
            },

            // Expense-like: the business owes more afterwards.
            Purchase => EffectProfile {
                category: Basic,
                affects_stock: true,
                requires_party: true,
                party_sign: 1.0,
                cash_sign: -1.0,
                stock_sign: 1.0,
                price_update: Some(PriceUpdate::Accumulate),
            },
            PayToVendor => EffectProfile {
                category: CashPayment,
                affects_stock: false,
                requires_party: true,
                party_sign: 1.0,
                cash_sign: -1.0,
                stock_sign: 0.0,
                price_update: None,
            },
            PayToCustomer => EffectProfile {
                category: CashPayment,
                affects_stock: false,
                requires_party: true,
                party_sign: 1.0,
                cash_sign: -1.0,
                stock_sign: 0.0,
                price_update: None,
            },
            CustomerReturn => EffectProfile {
                category: Basic,
                affects_stock: true,
                requires_party: true,
                party_sign: 1.0,
                cash_sign: -1.0,
                stock_sign: 1.0,
                price_update: None,
            },

            // Cash only.
            Expense => EffectProfile {
                category: ExpenseIncome,
                affects_stock: false,
                requires_party: false,
                party_sign: 0.0,
                cash_sign: -1.0,
                stock_sign: 0.0,
                price_update: None,
            },
            ExtraIncome => EffectProfile {
                category: ExpenseIncome,
                affects_stock: false,
                requires_party: false,
                party_sign: 0.0,
                cash_sign: 1.0,
                stock_sign: 0.0,
                price_update: None,
            },
            InvestmentDeposit => EffectProfile {
                category: CashPayment,
                affects_stock: false,
                requires_party: true,
                party_sign: 0.0,
                cash_sign: 1.0,
                stock_sign: 0.0,
                price_update: None,
            },
            InvestmentWithdraw => EffectProfile {
                category: CashPayment,
                affects_stock: false,
                requires_party: true,
                party_sign: 0.0,
                cash_sign: -1.0,
                stock_sign: 0.0,
                price_update: None,
            },
            // Moves money between two payment methods; the calculator also
            // applies the negated delta to the "from" method.
            PaymentTransfer => EffectProfile {
                category: Other,
                affects_stock: false,
                requires_party: false,
                party_sign: 0.0,
                cash_sign: 1.0,
                stock_sign: 0.0,
                price_update: None,
            },

            // Stock only.
            StockIncrease => EffectProfile {
                category: Category::StockAdjustment,
                affects_stock: true,
                requires_party: false,
                party_sign: 0.0,
                cash_sign: 0.0,
                stock_sign: 1.0,
                price_update: Some(PriceUpdate::Accumulate),
            },
            StockReduce => EffectProfile {
                category: Category::StockAdjustment,
                affects_stock: true,
                requires_party: false,
                party_sign: 0.0,
                cash_sign: 0.0,
                stock_sign: -1.0,
                price_update: Some(PriceUpdate::Decumulate),
            },
            // Moves stock between two warehouses; the calculator also
            // applies the negated delta to the "to" warehouse.
            StockTransfer => EffectProfile {
                category: Category::StockAdjustment,
                affects_stock: true,
                requires_party: false,
                party_sign: 0.0,
                cash_sign: 0.0,
                stock_sign: -1.0,
                price_update: None,
            },

            // Composite parents: children carry the effects.
            Manufacture => EffectProfile::zero(Category::Basic, false),
            JournalVoucher => EffectProfile::zero(Category::Other, false),

            // Orders and quotations record intent, not movement.
            SaleOrder => EffectProfile::zero(Category::Basic, true),
            PurchaseOrder => EffectProfile::zero(Category::Basic, true),
            Quotation => EffectProfile::zero(Category::Basic, true),
            TransactionType::StockAdjustment => {
                EffectProfile::zero(Category::StockAdjustment, false)
            }

            // Records.
            Meeting => EffectProfile::zero(Category::Record, true),
            Task => EffectProfile::zero(Category::Record, true),
            ClientNote => EffectProfile::zero(Category::Record, true),
            SelfNote => EffectProfile::zero(Category::Record, false),
            CashReminder => EffectProfile::zero(Category::Record, true),
        }
    }

    /// The category substitution used to un-apply a transaction.
    ///
    /// Reversal re-derives every delta through this kind rather than
    /// negating arithmetic ad hoc: undoing a Purchase is not "subtract the
    /// same formula" but "apply the Vendor Return formula", which is what
    /// keeps the average-price math correct.
    ///
    /// Payment Transfer and Stock Transfer reverse to themselves with their
    /// from/to endpoints swapped (see [`Self::is_endpoint_symmetric`]).
    pub const fn reverse(self) -> TransactionType {
        use TransactionType::*;
        match self {
            Sale => CustomerReturn,
            CustomerReturn => Sale,
            Purchase => VendorReturn,
            VendorReturn => Purchase,
            StockIncrease => StockReduce,
            StockReduce => StockIncrease,
            PayToVendor => GetFromVendor,
            GetFromVendor => PayToVendor,
            PayToCustomer => GetFromCustomer,
            GetFromCustomer => PayToCustomer,
            InvestmentDeposit => InvestmentWithdraw,
            InvestmentWithdraw => InvestmentDeposit,
            Expense => ExtraIncome,
            ExtraIncome => Expense,
            // Symmetric kinds: same shape, endpoints swap during reversal.
            PaymentTransfer => PaymentTransfer,
            StockTransfer => StockTransfer,
            // Everything else is effect-free and self-reversing.
            other => other,
        }
    }
}

// serde carries the stable code on the wire, same as the database column.
impl From<TransactionType> for i64 {
    fn from(ty: TransactionType) -> i64 {
        ty.code()
    }
}

impl TryFrom<i64> for TransactionType {
    type Error = CoreError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        TransactionType::from_code(code)
    }
}

impl TransactionType {
    /// Kinds whose reversal swaps the from/to endpoints instead of
    /// substituting a different category.
    #[inline]
    pub const fn is_endpoint_symmetric(self) -> bool {
        matches!(
            self,
            TransactionType::PaymentTransfer | TransactionType::StockTransfer
        )
    }

    /// Whether this kind moves physical stock.
    #[inline]
    pub const fn affects_stock(self) -> bool {
        self.profile().affects_stock
    }

    /// Whether a party reference is mandatory.
    #[inline]
    pub const fn requires_party(self) -> bool {
        self.profile().requires_party
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
