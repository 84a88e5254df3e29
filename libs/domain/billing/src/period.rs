// [libs/domain/billing/src/period.rs]
/*!
 * Aritmetica de periodos de facturacion (spec 4.D `ensure_cycles`).
 *
 * Resolucion de la pregunta abierta sobre meses de distinta longitud:
 * un ciclo MONTHLY que abre el dia 31 y cae en un mes sin dia 31 se
 * recorta al ultimo dia de ese mes (comportamiento de calendario
 * humano, igual al de la mayoria de los motores de facturacion SaaS).
 * DAILY y WEEKLY son aritmetica de duracion fija y no tienen este
 * problema.
 */

use cadence_domain_models::BillingCycleType;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

pub fn next_period_end(start: DateTime<Utc>, cycle_type: BillingCycleType) -> DateTime<Utc> {
    match cycle_type {
        BillingCycleType::Daily => start + Duration::days(1),
        BillingCycleType::Weekly => start + Duration::weeks(1),
        BillingCycleType::Monthly => add_one_calendar_month(start),
    }
}

fn add_one_calendar_month(start: DateTime<Utc>) -> DateTime<Utc> {
    let (target_year, target_month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };

    let last_day = days_in_month(target_year, target_month);
    let day = start.day().min(last_day);

    Utc.with_ymd_and_hms(
        target_year,
        target_month,
        day,
        start.hour(),
        start.minute(),
        start.second(),
    )
    .single()
    .expect("clamped day is always valid for its month")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single().unwrap();
    (first_of_next - Duration::days(1)).day()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn daily_advances_by_one_day() {
        assert_eq!(next_period_end(ts(2025, 2, 1), BillingCycleType::Daily), ts(2025, 2, 2));
    }

    #[test]
    fn weekly_advances_by_seven_days() {
        assert_eq!(next_period_end(ts(2025, 2, 1), BillingCycleType::Weekly), ts(2025, 2, 8));
    }

    #[test]
    fn monthly_clamps_to_end_of_shorter_month() {
        let end = next_period_end(ts(2025, 1, 31), BillingCycleType::Monthly);
        assert_eq!(end, ts(2025, 2, 28));
    }

    #[test]
    fn monthly_handles_leap_february() {
        let end = next_period_end(ts(2024, 1, 31), BillingCycleType::Monthly);
        assert_eq!(end, ts(2024, 2, 29));
    }

    #[test]
    fn monthly_rolls_over_year_boundary() {
        let end = next_period_end(ts(2025, 12, 15), BillingCycleType::Monthly);
        assert_eq!(end, ts(2026, 1, 15));
    }

    proptest::proptest! {
        /// `next_period_end` nunca retrocede y siempre aterriza dentro del
        /// mes objetivo (o exactamente un dia/semana despues para los
        /// ciclos de duracion fija), para cualquier dia de arranque valido.
        #[test]
        fn next_period_end_never_moves_backward(year in 2020i32..2030, month in 1u32..=12, day in 1u32..=28) {
            let start = ts(year, month, day);
            for cycle_type in [BillingCycleType::Daily, BillingCycleType::Weekly, BillingCycleType::Monthly] {
                let end = next_period_end(start, cycle_type);
                prop_assert!(end > start);
            }
        }

        #[test]
        fn monthly_advance_always_clamps_to_a_real_day(year in 2020i32..2030, month in 1u32..=12) {
            let start = ts(year, month, 31.min(days_in_month(year, month)));
            let end = next_period_end(start, BillingCycleType::Monthly);
            prop_assert!(end.day() <= days_in_month(end.year(), end.month()));
        }
    }
}
