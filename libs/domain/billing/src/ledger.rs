// [libs/domain/billing/src/ledger.rs]
/*!
 * Construccion pura del asiento contable derivado de los resultados de
 * tarificacion de un ciclo (spec 4.F). El algoritmo de 5 pasos:
 *
 * 1. Agrupar las lineas de todos los `rating_results` del ciclo por
 *    `(currency, charge_type)` (spec 4.F step 1 — un ciclo puede traer
 *    mas de un resultado, p.ej. un cargo plano y uno de uso).
 * 2. Debitar `accounts_receivable` por el total.
 * 3. Acreditar `revenue_usage` / `revenue_flat` segun el tipo de cargo.
 * 4. Omitir lineas de monto cero.
 * 5. Rechazar si debitos != creditos (invariante 3) antes de persistir.
 */

use crate::error::SchedulerError;
use cadence_domain_models::{
    ChargeType, Direction, LedgerAccountCode, LedgerEntryLine, RatingLineItem, RatingResult, Snowflake,
};
use std::collections::HashMap;

/// Totales agregados por tipo de cargo, en unidades minimas, para una
/// unica moneda (spec 4.F step 3: "single currency per entry").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingSummary {
    pub currency: String,
    pub totals_by_charge_type: HashMap<ChargeType, i64>,
}

impl RatingSummary {
    pub fn grand_total(&self) -> i64 {
        self.totals_by_charge_type.values().sum()
    }
}

/// Agrupa las lineas de cada `RatingResult` del ciclo por `(currency,
/// charge_type)`, tal como describe el join de spec 4.F step 1. Rechaza
/// un ciclo cuyos resultados mezclan mas de una moneda: el asiento
/// resultante solo puede llevar una.
pub fn summarize_rating(results: &[(RatingResult, Vec<RatingLineItem>)]) -> Result<RatingSummary, SchedulerError> {
    let currency = results
        .first()
        .map(|(result, _)| result.currency.clone())
        .ok_or_else(|| SchedulerError::BusinessRule("no rating results to summarize".into()))?;

    let mut totals: HashMap<ChargeType, i64> = HashMap::new();
    for (result, lines) in results {
        if result.currency != currency {
            return Err(SchedulerError::BusinessRule(format!(
                "cycle mixes currencies {currency} and {} across rating results",
                result.currency
            )));
        }
        let entry = totals.entry(result.charge_type).or_insert(0);
        for line in lines {
            *entry += line.amount_minor;
        }
    }

    Ok(RatingSummary {
        currency,
        totals_by_charge_type: totals,
    })
}

fn revenue_code_for(charge_type: ChargeType) -> LedgerAccountCode {
    match charge_type {
        ChargeType::Usage => LedgerAccountCode::revenue_usage(),
        ChargeType::Flat => LedgerAccountCode::revenue_flat(),
    }
}

/// Construye las lineas de un asiento balanceado. `account_lookup` resuelve
/// un codigo de cuenta al `Snowflake` de la fila `ledger_accounts` de la
/// organizacion (el repositorio la puebla antes de llamar aqui).
pub fn build_entry_lines(
    entry_id: Snowflake,
    summary: &RatingSummary,
    mut next_line_id: impl FnMut() -> Snowflake,
    account_lookup: impl Fn(&LedgerAccountCode) -> Option<Snowflake>,
) -> Result<Vec<LedgerEntryLine>, SchedulerError> {
    let grand_total = summary.grand_total();
    if grand_total <= 0 {
        return Ok(Vec::new());
    }

    let receivable_account = account_lookup(&LedgerAccountCode::accounts_receivable())
        .ok_or_else(|| SchedulerError::BusinessRule("missing accounts_receivable ledger account".into()))?;

    let mut lines = vec![LedgerEntryLine {
        id: next_line_id(),
        entry_id,
        account_id: receivable_account,
        direction: Direction::Debit,
        amount_minor: grand_total,
    }];

    for (charge_type, amount) in &summary.totals_by_charge_type {
        if *amount == 0 {
            continue;
        }
        let code = revenue_code_for(*charge_type);
        let account_id = account_lookup(&code)
            .ok_or_else(|| SchedulerError::BusinessRule(format!("missing {code} ledger account")))?;
        lines.push(LedgerEntryLine {
            id: next_line_id(),
            entry_id,
            account_id,
            direction: Direction::Credit,
            amount_minor: *amount,
        });
    }

    assert_balanced(&lines)?;
    Ok(lines)
}

/// Invariante 3: la suma de debitos debe igualar la suma de creditos.
pub fn assert_balanced(lines: &[LedgerEntryLine]) -> Result<(), SchedulerError> {
    let debits: i64 = lines
        .iter()
        .filter(|l| l.direction == Direction::Debit)
        .map(|l| l.amount_minor)
        .sum();
    let credits: i64 = lines
        .iter()
        .filter(|l| l.direction == Direction::Credit)
        .map(|l| l.amount_minor)
        .sum();
    if debits != credits {
        return Err(SchedulerError::BusinessRule(format!(
            "unbalanced entry: debits={debits} credits={credits}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rating_result(charge_type: ChargeType) -> RatingResult {
        RatingResult {
            id: Snowflake(1),
            billing_cycle_id: Snowflake(2),
            org_id: Snowflake(3),
            currency: "USD".to_string(),
            charge_type,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn balanced_entry_for_usage_charges() {
        let result = rating_result(ChargeType::Usage);
        let lines = vec![
            RatingLineItem { id: Snowflake(10), rating_result_id: result.id, amount_minor: 500 },
            RatingLineItem { id: Snowflake(11), rating_result_id: result.id, amount_minor: 250 },
        ];
        let summary = summarize_rating(&[(result, lines)]).unwrap();
        assert_eq!(summary.grand_total(), 750);

        let mut next_id = 100i64;
        let entry_lines = build_entry_lines(
            Snowflake(1000),
            &summary,
            || {
                next_id += 1;
                Snowflake(next_id)
            },
            |code| {
                if *code == LedgerAccountCode::accounts_receivable() {
                    Some(Snowflake(1))
                } else if *code == LedgerAccountCode::revenue_usage() {
                    Some(Snowflake(2))
                } else {
                    None
                }
            },
        )
        .unwrap();

        assert_eq!(entry_lines.len(), 2);
        assert_balanced(&entry_lines).unwrap();
    }

    #[test]
    fn zero_total_produces_no_lines() {
        let result = rating_result(ChargeType::Flat);
        let summary = summarize_rating(&[(result, vec![])]).unwrap();
        let lines = build_entry_lines(Snowflake(1), &summary, || Snowflake(1), |_| Some(Snowflake(1))).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn missing_account_mapping_is_rejected() {
        let result = rating_result(ChargeType::Usage);
        let lines = vec![RatingLineItem { id: Snowflake(1), rating_result_id: result.id, amount_minor: 100 }];
        let summary = summarize_rating(&[(result, lines)]).unwrap();
        let err = build_entry_lines(Snowflake(1), &summary, || Snowflake(1), |_| None).unwrap_err();
        assert!(matches!(err, SchedulerError::BusinessRule(_)));
    }

    #[test]
    fn flat_and_usage_results_in_the_same_cycle_both_post() {
        let flat = rating_result(ChargeType::Flat);
        let flat_lines = vec![RatingLineItem { id: Snowflake(20), rating_result_id: flat.id, amount_minor: 2_000 }];
        let usage = RatingResult { id: Snowflake(2), ..rating_result(ChargeType::Usage) };
        let usage_lines = vec![RatingLineItem { id: Snowflake(21), rating_result_id: usage.id, amount_minor: 1_500 }];

        let summary = summarize_rating(&[(flat, flat_lines), (usage, usage_lines)]).unwrap();
        assert_eq!(summary.grand_total(), 3_500);

        let mut next_id = 0i64;
        let entry_lines = build_entry_lines(Snowflake(1), &summary, || {
            next_id += 1;
            Snowflake(next_id)
        }, |code| {
            if *code == LedgerAccountCode::accounts_receivable() {
                Some(Snowflake(1))
            } else if *code == LedgerAccountCode::revenue_flat() {
                Some(Snowflake(2))
            } else if *code == LedgerAccountCode::revenue_usage() {
                Some(Snowflake(3))
            } else {
                None
            }
        })
        .unwrap();

        assert_eq!(entry_lines.len(), 3, "one debit plus a credit per charge_type");
        assert_balanced(&entry_lines).unwrap();
    }

    #[test]
    fn mixed_currencies_in_the_same_cycle_are_rejected() {
        let usd = rating_result(ChargeType::Flat);
        let eur = RatingResult { id: Snowflake(2), currency: "EUR".to_string(), ..rating_result(ChargeType::Usage) };
        let err = summarize_rating(&[(usd, vec![]), (eur, vec![])]).unwrap_err();
        assert!(matches!(err, SchedulerError::BusinessRule(_)));
    }

    proptest::proptest! {
        /// Invariante 3, generalizada: para cualquier mezcla no negativa de
        /// cargos de uso y planos, el asiento resultante siempre balancea.
        #[test]
        fn any_mix_of_usage_and_flat_amounts_balances(usage in 0i64..1_000_000, flat in 0i64..1_000_000) {
            let mut totals = HashMap::new();
            totals.insert(ChargeType::Usage, usage);
            totals.insert(ChargeType::Flat, flat);
            let summary = RatingSummary { currency: "USD".to_string(), totals_by_charge_type: totals };

            let mut next_id = 0i64;
            let lines = build_entry_lines(
                Snowflake(1),
                &summary,
                || {
                    next_id += 1;
                    Snowflake(next_id)
                },
                |_| Some(Snowflake(1)),
            )
            .unwrap();

            assert_balanced(&lines).unwrap();
            if usage + flat == 0 {
                prop_assert!(lines.is_empty());
            }
        }
    }
}
