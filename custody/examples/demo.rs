//! Walkthrough of the full custody lifecycle: feed configuration, a native
//! deposit, a token deposit, a cap rejection, and a withdrawal with the
//! feed dark.
//!
//! Run with:
//!   cargo run --example demo

use std::sync::Arc;

use alloy_primitives::{I256, U256};

use vela_custody::{
    AdminAllowlist, AssetId, CanonicalValue, CustodyEngine, FixedPrice, MemorySink, OwnerId,
    TransferError, TransferPort,
};

/// A port that always succeeds and narrates what it moves.
struct NarratingPort;

impl TransferPort for NarratingPort {
    fn transfer_in(
        &mut self,
        from: &OwnerId,
        asset: AssetId,
        amount: U256,
    ) -> Result<(), TransferError> {
        println!("  [port] pulled {} of {:?} from {}", amount, asset, from);
        Ok(())
    }

    fn transfer_out(
        &mut self,
        to: &OwnerId,
        asset: AssetId,
        amount: U256,
    ) -> Result<(), TransferError> {
        println!("  [port] paid {} of {:?} out to {}", amount, asset, to);
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let ops = OwnerId::new("vela:ops");
    let alice = OwnerId::new("vela:alice");
    let weth = AssetId::derive("eth-mainnet", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

    let sink = MemorySink::new();
    let mut engine = CustodyEngine::new(
        Box::new(NarratingPort),
        Box::new(sink.clone()),
        Box::new(AdminAllowlist::single(ops.clone())),
    );

    println!("== configuring feeds and cap ==");
    engine
        .set_price_feed(
            &ops,
            AssetId::native(),
            Arc::new(FixedPrice::new(
                I256::try_from(1_00i64).expect("fits"),
                2,
                "native-pin",
            )),
        )
        .expect("ops holds the admin capability");
    engine
        .set_price_feed(
            &ops,
            weth,
            Arc::new(FixedPrice::new(
                I256::try_from(2_000_00i64).expect("fits"),
                2,
                "weth-usd",
            )),
        )
        .expect("ops holds the admin capability");
    engine
        .set_global_cap(&ops, CanonicalValue::from_raw(U256::from(5_000_000_000u64)))
        .expect("ops holds the admin capability");
    println!("  cap set to {}", engine.cap().limit());

    println!("\n== native deposit ==");
    let receipt = engine
        .deposit(&alice, AssetId::native(), U256::from(100u64), U256::from(100u64))
        .expect("within cap, exact payment");
    println!("  credited {} (value {})", receipt.new_balance, receipt.value);

    println!("\n== token deposit ==");
    let receipt = engine
        .deposit(&alice, weth, U256::from(2u64), U256::ZERO)
        .expect("within cap");
    println!("  credited {} WETH (value {})", receipt.new_balance, receipt.value);
    println!("  total custodied: {}", engine.total_custodied_value());

    println!("\n== a deposit the cap rejects ==");
    match engine.deposit(&alice, weth, U256::from(10u64), U256::ZERO) {
        Err(err) => println!("  rejected: {}", err),
        Ok(_) => unreachable!("10 WETH would blow through the cap"),
    }

    println!("\n== withdrawal ==");
    let receipt = engine
        .withdraw(&alice, weth, U256::from(1u64))
        .expect("alice owns it");
    println!("  remaining {} WETH (reported value {})", receipt.new_balance, receipt.value);

    println!("\n== audit trail ==");
    for event in sink.snapshot() {
        println!("  {:?}", event);
    }
}
