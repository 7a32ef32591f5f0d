//! Warranty creation: code allocation, serial resolution, expiry
//! pre-computation.
//!
//! Allocation is optimistic. The service reads the store's last code as a
//! guess, proposes the next sequence number, and attempts the atomic
//! insert. Two concurrent requests can propose the same number; the
//! storage layer's `(store_id, code)` constraint rejects exactly one of
//! them, which recomputes and retries. No locks, no counter table - the
//! constraint is the sole source of truth.

use tracing::{debug, instrument, warn};

use warrantly_core::dates::{approx_months, compute_expiry, duration_days, today_utc};

use crate::codes::{DEFAULT_CODE_PREFIX, next_code, resolve_serials};
use crate::error::WarrantyError;
use crate::models::{CreateWarranty, ItemSpec, NewWarranty, NewWarrantyItem, Warranty};
use crate::storage::{Constraint, StorageError, WarrantyStore};

/// Tuning knobs for the code allocator.
#[derive(Debug, Clone)]
pub struct AllocatorOptions {
    /// Code prefix, e.g. `WR` for warranty headers.
    pub prefix: String,
    /// Insert attempts before giving up with
    /// [`WarrantyError::AllocationExhausted`].
    pub max_attempts: u32,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CODE_PREFIX.to_owned(),
            max_attempts: 5,
        }
    }
}

/// Warranty creation service, generic over the storage collaborator.
pub struct WarrantyService<S> {
    store: S,
    options: AllocatorOptions,
}

impl<S: WarrantyStore> WarrantyService<S> {
    /// Create a service with the default allocator options.
    pub fn new(store: S) -> Self {
        Self::with_options(store, AllocatorOptions::default())
    }

    /// Create a service with explicit allocator options.
    pub const fn with_options(store: S, options: AllocatorOptions) -> Self {
        Self { store, options }
    }

    /// Allocate a code and create a header with all its items atomically.
    ///
    /// Serials are resolved to be unique within the header, expiry dates
    /// are pre-computed from purchase date and duration, and the whole
    /// header is inserted all-or-nothing. Either everything is persisted
    /// under one fresh code, or nothing is.
    ///
    /// # Errors
    ///
    /// - [`WarrantyError::NoItems`] for an empty item list
    /// - [`WarrantyError::AllocationExhausted`] after `max_attempts` code
    ///   collisions
    /// - [`WarrantyError::SerialConflict`] if storage rejects a serial
    /// - [`WarrantyError::Storage`] for any other storage failure
    #[instrument(skip(self, request), fields(store_id = %request.store_id))]
    pub async fn create_warranty(&self, request: CreateWarranty) -> Result<Warranty, WarrantyError> {
        if request.items.is_empty() {
            return Err(WarrantyError::NoItems);
        }

        let items = resolve_items(request.items);

        for attempt in 1..=self.options.max_attempts {
            let last = self
                .store
                .last_code(request.store_id, &self.options.prefix)
                .await?;
            let code = next_code(&self.options.prefix, last.as_deref());

            let proposal = NewWarranty {
                store_id: request.store_id,
                code: code.clone(),
                customer: request.customer.clone(),
                items: items.clone(),
            };

            match self.store.insert_warranty(proposal).await {
                Ok(warranty) => {
                    debug!(code = %warranty.code, items = warranty.items.len(), attempt, "warranty created");
                    return Ok(warranty);
                }
                Err(StorageError::UniqueViolation(Constraint::WarrantyCode)) => {
                    // Lost the race for this sequence number; recompute
                    // from the now-current last code and try again.
                    debug!(%code, attempt, "warranty code taken, retrying");
                }
                Err(StorageError::UniqueViolation(Constraint::ItemSerial)) => {
                    return Err(WarrantyError::SerialConflict);
                }
                Err(other) => return Err(other.into()),
            }
        }

        warn!(
            attempts = self.options.max_attempts,
            "warranty code allocation exhausted"
        );
        Err(WarrantyError::AllocationExhausted {
            attempts: self.options.max_attempts,
        })
    }
}

/// Resolve serials and dates for every item of one creation request.
fn resolve_items(specs: Vec<ItemSpec>) -> Vec<NewWarrantyItem> {
    let serials = resolve_serials(specs.iter().map(|spec| spec.serial.as_deref()));

    specs
        .into_iter()
        .zip(serials)
        .map(|(spec, serial)| {
            let purchase_date = spec.purchase_date.unwrap_or_else(today_utc);
            let expiry_date =
                compute_expiry(Some(purchase_date), spec.duration_months, spec.expiry_date);
            let duration_days = duration_days(Some(purchase_date), expiry_date);
            // Keep a positive caller-supplied month count; otherwise
            // back-fill an approximation from the day span when an
            // explicit expiry made one derivable.
            let duration_months = spec
                .duration_months
                .filter(|months| *months > 0)
                .or_else(|| duration_days.map(approx_months));

            NewWarrantyItem {
                product_name: spec.product_name,
                model: spec.model,
                serial,
                purchase_date,
                expiry_date,
                duration_months,
                duration_days,
                coverage_note: spec.coverage_note,
                note: spec.note,
                images: spec.images,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use warrantly_core::{StoreId, WarrantyId, WarrantyItemId};

    use super::*;
    use crate::models::CustomerDetails;

    /// Store stub that reports a scripted sequence of "last code" reads
    /// and conflicts, recording every insert attempt.
    #[derive(Default)]
    struct ScriptedStore {
        last_codes: Mutex<Vec<Option<String>>>,
        conflicts_remaining: Mutex<u32>,
        inserted_codes: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        fn with_reads(reads: Vec<Option<String>>, conflicts: u32) -> Self {
            Self {
                last_codes: Mutex::new(reads),
                conflicts_remaining: Mutex::new(conflicts),
                inserted_codes: Mutex::new(Vec::new()),
            }
        }
    }

    impl WarrantyStore for ScriptedStore {
        async fn last_code(
            &self,
            _store_id: StoreId,
            _prefix: &str,
        ) -> Result<Option<String>, StorageError> {
            let mut reads = self.last_codes.lock().expect("lock");
            if reads.is_empty() {
                Ok(None)
            } else {
                Ok(reads.remove(0))
            }
        }

        async fn insert_warranty(&self, warranty: NewWarranty) -> Result<Warranty, StorageError> {
            {
                let mut conflicts = self.conflicts_remaining.lock().expect("lock");
                if *conflicts > 0 {
                    *conflicts -= 1;
                    return Err(StorageError::UniqueViolation(Constraint::WarrantyCode));
                }
            }
            self.inserted_codes
                .lock()
                .expect("lock")
                .push(warranty.code.clone());
            Ok(persisted(warranty))
        }
    }

    fn persisted(warranty: NewWarranty) -> Warranty {
        let items = warranty
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| crate::models::WarrantyItem {
                id: WarrantyItemId::new(i64::try_from(i).unwrap_or(0) + 1),
                product_name: item.product_name,
                model: item.model,
                serial: item.serial,
                purchase_date: item.purchase_date,
                expiry_date: item.expiry_date,
                duration_months: item.duration_months,
                duration_days: item.duration_days,
                coverage_note: item.coverage_note,
                note: item.note,
                images: item.images,
            })
            .collect();
        Warranty {
            id: WarrantyId::new(1),
            store_id: warranty.store_id,
            code: warranty.code,
            customer: warranty.customer,
            items,
            created_at: chrono::Utc::now(),
        }
    }

    fn request(items: Vec<ItemSpec>) -> CreateWarranty {
        CreateWarranty {
            store_id: StoreId::new(42),
            customer: CustomerDetails::default(),
            items,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[tokio::test]
    async fn test_first_code_for_store_is_001() {
        let service = WarrantyService::new(ScriptedStore::default());
        let warranty = service
            .create_warranty(request(vec![ItemSpec::default()]))
            .await
            .expect("create");
        assert_eq!(warranty.code, "WR001");
    }

    #[tokio::test]
    async fn test_code_continues_from_last() {
        let store = ScriptedStore::with_reads(vec![Some("WR007".to_owned())], 0);
        let service = WarrantyService::new(store);
        let warranty = service
            .create_warranty(request(vec![ItemSpec::default()]))
            .await
            .expect("create");
        assert_eq!(warranty.code, "WR008");
    }

    #[tokio::test]
    async fn test_conflict_recomputes_and_retries() {
        // First read sees WR001 as last; the insert of WR002 collides
        // (someone else committed it), the re-read sees WR002, and the
        // retry lands WR003.
        let store = ScriptedStore::with_reads(
            vec![Some("WR001".to_owned()), Some("WR002".to_owned())],
            1,
        );
        let service = WarrantyService::new(store);
        let warranty = service
            .create_warranty(request(vec![ItemSpec::default()]))
            .await
            .expect("create");
        assert_eq!(warranty.code, "WR003");
    }

    #[tokio::test]
    async fn test_allocation_exhausted_after_bound() {
        let store = ScriptedStore::with_reads(Vec::new(), u32::MAX);
        let service = WarrantyService::new(store);
        let err = service
            .create_warranty(request(vec![ItemSpec::default()]))
            .await
            .expect_err("should exhaust");
        assert!(matches!(
            err,
            WarrantyError::AllocationExhausted { attempts: 5 }
        ));
    }

    #[tokio::test]
    async fn test_empty_items_rejected() {
        let service = WarrantyService::new(ScriptedStore::default());
        let err = service
            .create_warranty(request(Vec::new()))
            .await
            .expect_err("should reject");
        assert!(matches!(err, WarrantyError::NoItems));
    }

    #[tokio::test]
    async fn test_expiry_precomputed_with_clamping() {
        let service = WarrantyService::new(ScriptedStore::default());
        let warranty = service
            .create_warranty(request(vec![ItemSpec {
                purchase_date: Some(ymd(2025, 1, 31)),
                duration_months: Some(1),
                ..ItemSpec::default()
            }]))
            .await
            .expect("create");

        let item = warranty.items.first().expect("one item");
        assert_eq!(item.serial, "SN001");
        assert_eq!(item.expiry_date, Some(ymd(2025, 2, 28)));
        assert_eq!(item.duration_months, Some(1));
        assert_eq!(item.duration_days, Some(28));
    }

    #[tokio::test]
    async fn test_explicit_expiry_backfills_months() {
        let service = WarrantyService::new(ScriptedStore::default());
        let warranty = service
            .create_warranty(request(vec![ItemSpec {
                purchase_date: Some(ymd(2025, 1, 1)),
                expiry_date: Some(ymd(2026, 1, 1)),
                ..ItemSpec::default()
            }]))
            .await
            .expect("create");

        let item = warranty.items.first().expect("one item");
        assert_eq!(item.expiry_date, Some(ymd(2026, 1, 1)));
        assert_eq!(item.duration_days, Some(365));
        assert_eq!(item.duration_months, Some(12));
    }

    #[tokio::test]
    async fn test_serials_unique_within_request() {
        let service = WarrantyService::new(ScriptedStore::default());
        let specs = vec![
            ItemSpec {
                serial: Some("SN001".to_owned()),
                ..ItemSpec::default()
            },
            ItemSpec::default(),
            ItemSpec {
                serial: Some("SN001".to_owned()),
                ..ItemSpec::default()
            },
        ];
        let warranty = service
            .create_warranty(request(specs))
            .await
            .expect("create");

        let serials: Vec<_> = warranty.items.iter().map(|i| i.serial.clone()).collect();
        assert_eq!(serials, vec!["SN001", "SN002", "SN003"]);
    }

    #[tokio::test]
    async fn test_no_expiry_stays_open_ended() {
        let service = WarrantyService::new(ScriptedStore::default());
        let warranty = service
            .create_warranty(request(vec![ItemSpec {
                purchase_date: Some(ymd(2025, 1, 1)),
                ..ItemSpec::default()
            }]))
            .await
            .expect("create");

        let item = warranty.items.first().expect("one item");
        assert_eq!(item.expiry_date, None);
        assert_eq!(item.duration_days, None);
        assert_eq!(item.duration_months, None);
    }
}
