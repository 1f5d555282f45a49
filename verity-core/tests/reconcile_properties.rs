use chrono::{Duration, NaiveDate};
use verity_core::{Balance, BalanceReconciler, MismatchKind, Statement, Transaction};

/// Deterministic statement: opening balance, then a mix of credits and debits
/// whose printed balances are exactly `previous + amount`.
fn consistent_statement(len: usize, opening: f64) -> Vec<Transaction> {
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let mut balance = opening;
    let mut out = vec![Transaction::new(0, "Opening Balance", start, 0.0, Some(opening))];
    for i in 1..len {
        let step = ((i * 37) % 500) as f64 + 0.25 * (i % 4) as f64;
        let amount = if i % 3 == 0 { step } else { -step };
        balance += amount;
        out.push(Transaction::new(
            i as i64,
            format!("txn {i}"),
            start + Duration::days(i as i64),
            amount,
            Some(balance),
        ));
    }
    out
}

#[test]
fn test_consistent_sequences_never_flag() {
    for len in [1, 2, 5, 40, 200] {
        for opening in [0.0, 2649.13, -1200.5, 1_000_000.0] {
            let r = BalanceReconciler::default().reconcile(consistent_statement(len, opening));
            assert!(r.is_clean(), "len={len} opening={opening}: {:?}", r.descriptions());
        }
    }
}

#[test]
fn test_single_perturbation_flags_only_that_entry() {
    let base = consistent_statement(30, 5000.0);
    for target in 1..base.len() {
        // Every printed balance from `target` on is 1.00 higher: the statement
        // was doctored at one entry and carried forward from there.
        let mut shifted = base.clone();
        for t in shifted.iter_mut().skip(target) {
            if let Some(Balance::Amount(v)) = t.balance {
                t.balance = Some(Balance::Amount(v + 1.0));
            }
        }
        let r = BalanceReconciler::default().reconcile(shifted);
        let flagged: Vec<usize> = r.mismatches.iter().map(|m| m.index).collect();
        assert_eq!(flagged, vec![target], "shifted from entry {target}");

        // Same story when the amount column is the doctored cell.
        let mut amended = base.clone();
        amended[target].amount += 1.0;
        let r = BalanceReconciler::default().reconcile(amended);
        let flagged: Vec<usize> = r.mismatches.iter().map(|m| m.index).collect();
        assert_eq!(flagged, vec![target], "amended entry {target}");
    }
}

#[test]
fn test_running_value_resumes_from_perturbed_actual() {
    let mut txns = consistent_statement(6, 100.0);
    // Shift every balance from entry 3 on by +1.00: only entry 3 is wrong.
    for t in txns.iter_mut().skip(3) {
        if let Some(Balance::Amount(v)) = t.balance {
            t.balance = Some(Balance::Amount(v + 1.0));
        }
    }
    let r = BalanceReconciler::default().reconcile(txns);
    assert_eq!(r.mismatches.len(), 1);
    assert_eq!(r.mismatches[0].index, 3);
    match r.mismatches[0].kind {
        MismatchKind::Balance { expected, actual, .. } => assert!((actual - expected - 1.0).abs() < 1e-6),
        ref other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_small_perturbations_never_flag() {
    let base = consistent_statement(20, 750.0);
    for delta in [0.015, -0.015, 0.01, -0.005, 0.0] {
        let mut txns = base.clone();
        for t in txns.iter_mut().skip(1).step_by(2) {
            if let Some(Balance::Amount(v)) = t.balance {
                t.balance = Some(Balance::Amount(v + delta));
            }
        }
        // Only perturb isolated entries whose neighbours are exact, so each
        // comparison sees at most |delta|.
        let r = BalanceReconciler::default().reconcile(txns);
        assert!(r.is_clean(), "delta={delta}: {:?}", r.descriptions());
    }
}

#[test]
fn test_missing_balances_do_not_break_later_checks() {
    let mut txns = consistent_statement(12, 300.0);
    for i in [2, 3, 7] {
        txns[i].balance = None;
    }
    let r = BalanceReconciler::default().reconcile(txns.clone());
    assert!(r.is_clean(), "{:?}", r.descriptions());

    // A real error after a gap is still caught.
    if let Some(Balance::Amount(v)) = txns[8].balance {
        txns[8].balance = Some(Balance::Amount(v - 4.0));
    }
    let r = BalanceReconciler::default().reconcile(txns);
    assert_eq!(r.mismatches.first().map(|m| m.index), Some(8));
}

#[test]
fn test_revalidation_of_edited_json() {
    let edited = serde_json::json!({
        "account_info": { "holder_name": "A. Customer", "final_balance": 2200.0 },
        "transactions": [
            { "id": 1, "details": "Opening Balance", "date": "01-01-2025", "amount": 0, "balance": "2,649.13 Cr" },
            { "id": 2, "details": "Card purchase", "date": "02-01-2025", "amount": -50.0, "balance": 2599.13 },
            { "id": 3, "details": "Transfer out", "date": "03-01-2025", "amount": "-399.13", "balance": "2,200.00", "mismatch": true }
        ]
    });
    let statement: Statement = serde_json::from_value(edited).unwrap();
    let r = BalanceReconciler::default().reconcile(statement.transactions);
    assert!(r.is_clean(), "{:?}", r.descriptions());
    assert!(r.transactions.iter().all(|t| !t.mismatch));
}
