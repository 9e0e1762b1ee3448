//! End-to-end storefront scenarios across page loads

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use storefront_core::eligibility::{EligibilityCriteria, Scheme};
use storefront_core::gateway::{CardProbeResult, PaymentDetails, PaymentLink, PaymentSession};
use storefront_core::{
    CartItem, CartStore, CheckoutController, Clock, Currency, EligibilityGate, FxAdapter, GateStatus,
    HandoffMode, HandoffOutcome, HoldTick, HoldTimer, ManualClock, MemoryStorage, Page, PayloadBuilder,
    PaymentGateway, PaymentHandoff, PaymentPayload, ProbeDriver, ProbeKind, Scope, ShippingAddress,
    ShopperSession, StaticRatesSource, Storage, StorageKey, WidgetEvent,
};
use storefront_core::{CardMetadataService, Result};

struct VisaLookup;

#[async_trait]
impl CardMetadataService for VisaLookup {
    async fn probe_card_metadata(&self, pan_or_bin: &str, kind: ProbeKind) -> Result<CardProbeResult> {
        Ok(CardProbeResult {
            bin: pan_or_bin.chars().take(kind.bin_len()).collect(),
            scheme: "Visa".into(),
            card_type: "credit".into(),
            issuer: "The Hongkong and Shanghai Banking Corporation Limited".into(),
            issuer_country: "HK".into(),
        })
    }
}

struct HostedPages;

#[async_trait]
impl PaymentGateway for HostedPages {
    async fn create_payment_link(&self, payload: &PaymentPayload) -> Result<PaymentLink> {
        Ok(PaymentLink {
            id: Some(payload.reference.clone()),
            link: format!("https://pay.example/{}", payload.reference),
        })
    }

    async fn create_payment_session(&self, payload: &PaymentPayload) -> Result<PaymentSession> {
        Ok(PaymentSession {
            id: payload.reference.clone(),
            payment_session_token: "pst_1".into(),
            payment_session_secret: None,
        })
    }

    async fn fetch_payment_details(&self, _payment_id: &str) -> Result<PaymentDetails> {
        Ok(PaymentDetails {
            status: Some("Captured".into()),
            customer_id: Some("cus_1".into()),
            instrument_id: Some("src_1".into()),
        })
    }
}

fn storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::new())
}

#[test]
fn hkd_cart_add_merge_and_remove() {
    let storage = storage();
    let mut cart = CartStore::load(storage.clone());
    let case = CartItem::new("case-black", "Phone Case Black", dec!(100), Currency::Hkd);

    cart.add(case.clone()).unwrap();
    cart.add(case.clone()).unwrap();
    assert_eq!(cart.total(Currency::Hkd), dec!(200.00));

    cart.add(case).unwrap();
    assert_eq!(cart.items()[0].quantity, 3);
    assert_eq!(cart.total(Currency::Hkd), dec!(300.00));

    cart.set_quantity(0, -3).unwrap();
    assert!(cart.is_empty());
    assert!(CartStore::load(storage).is_empty());
}

#[test]
fn cart_survives_page_reload() {
    let storage = storage();
    let mut cart = CartStore::load(storage.clone());
    cart.add(CartItem::new("case-black", "Phone Case Black", dec!(100), Currency::Hkd)).unwrap();
    cart.add(CartItem::new("gift-500", "Gift Card 500", dec!(64), Currency::Usd)).unwrap();
    cart.add(CartItem::new("case-black", "Phone Case Black", dec!(100), Currency::Hkd)).unwrap();
    cart.set_quantity(1, 4).unwrap();

    let reloaded = CartStore::load(storage);
    assert_eq!(reloaded.items(), cart.items());
    assert_eq!(reloaded.total(Currency::Usd), dec!(320));
}

#[test]
fn seat_hold_countdown_and_single_eviction() {
    let storage = storage();
    let start = Utc::now();
    let clock = ManualClock::new(start);
    let mut timer = HoldTimer::new(storage.clone(), Arc::new(clock.clone()));
    timer.enter("B07").unwrap();

    let display = |tick: HoldTick| match tick {
        HoldTick::Running { display, .. } => display,
        other => panic!("expected a running hold, got {other:?}"),
    };

    assert_eq!(display(timer.tick()), "05:00");
    clock.set(start + Duration::seconds(299));
    assert_eq!(display(timer.tick()), "00:01");

    clock.set(start + Duration::seconds(300));
    assert_eq!(timer.tick(), HoldTick::Evicted { redirect: Page::Eligibility });
    clock.advance(Duration::seconds(1));
    assert_eq!(timer.tick(), HoldTick::Inactive);
    assert!(storage.get(Scope::Session, StorageKey::SeatSelection).unwrap().is_none());
}

#[tokio::test]
async fn physical_checkout_redirects_to_hosted_page() {
    let storage = storage();
    let mut cart = CartStore::load(storage.clone());
    cart.add(CartItem::new("case-black", "Phone Case Black", dec!(100), Currency::Hkd)).unwrap();

    let mut fx = FxAdapter::new(Arc::new(StaticRatesSource::default()));
    fx.fetch_rates().await;

    let session = ShopperSession::new(storage.clone());
    let mut checkout = CheckoutController::enter(session, Page::Cart).unwrap();
    checkout
        .choose_carrier(ShippingAddress {
            first_name: "Mei".into(),
            last_name: "Chan".into(),
            address_line1: "1 Queen's Road Central".into(),
            region: "Central".into(),
            country: "HK".into(),
            ..ShippingAddress::default()
        })
        .unwrap();
    checkout.continue_checkout().unwrap();
    assert!(checkout.state().ready_for_payment());
    assert_eq!(checkout.order_total(&cart, &fx, Currency::Hkd), dec!(130));

    let payload = PayloadBuilder::new(Arc::new(ManualClock::new(Utc::now())), "HK", Currency::Hkd)
        .from_cart(&cart, &checkout.state().selected_carrier, &fx)
        .unwrap();
    assert_eq!(payload.amount_minor_units, 13_000);

    let handoff = PaymentHandoff::new(Arc::new(HostedPages), storage.clone());
    let outcome = handoff.start(&payload).await.unwrap();
    assert_eq!(
        outcome,
        HandoffOutcome::Redirect(format!("https://pay.example/{}", payload.reference))
    );
    assert_eq!(CartStore::load(storage).items(), cart.items());
}

#[tokio::test(start_paused = true)]
async fn presale_card_to_seat_to_embedded_payment() {
    let storage = storage();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

    let criteria = EligibilityCriteria::scheme(Scheme::Visa).with_issuer("hongkong_and_shanghai");
    let driver = ProbeDriver::new(EligibilityGate::new(ProbeKind::FullPan, criteria), Arc::new(VisaLookup));
    let status = driver.on_input("4111 1111 1111 1111").await;
    assert!(matches!(status, GateStatus::Eligible { ref card } if card.bin == "41111111"));

    let mut timer = HoldTimer::new(storage.clone(), clock.clone());
    let hold = timer.enter("VIP-2").unwrap();

    let fx = FxAdapter::new(Arc::new(StaticRatesSource::default()));
    let payload = PayloadBuilder::new(clock, "HK", Currency::Usd).for_seat(&hold, dec!(1000), &fx);
    assert_eq!(payload.amount_minor_units, 12_800);

    let handoff = PaymentHandoff::new(Arc::new(HostedPages), storage.clone());
    handoff.set_mode(HandoffMode::Embedded).unwrap();
    assert!(matches!(handoff.start(&payload).await.unwrap(), HandoffOutcome::MountWidget(_)));

    handoff
        .on_widget_event(WidgetEvent::Completed {
            payment_id: "pay_1".into(),
        })
        .await
        .unwrap();

    assert_eq!(HoldTimer::new(storage.clone(), Arc::new(ManualClock::new(Utc::now()))).hold(), None);
    let returning = ShopperSession::new(storage).returning_customer();
    assert_eq!(returning.customer_id.as_deref(), Some("cus_1"));
}
