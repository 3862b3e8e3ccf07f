//! Outgoing operations from handlers, retries and the error queue.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use testbus::{
    headers, BusError, CancellationToken, HandlerError, HandlerPipeline, Messages, SagaData,
    TestingBus, TestingOptions, TypeBasedRouter,
};

use support::{bus_with, bus_with_options, clock, init_tracing, Greeting, OrderPlaced, PlaceOrder, ShipOrder};

#[test]
fn reply_goes_to_the_reply_queue() {
    let (_, bus) = bus_with(HandlerPipeline::new().handle::<PlaceOrder, _>(|ctx, order| {
        ctx.reply(&OrderPlaced {
            order_id: order.order_id,
        })?;
        Ok(())
    }));

    bus.process_message(&PlaceOrder {
        order_id: "o-1".into(),
        quantity: 2,
    })
    .unwrap();

    let replies = bus.replied_messages();
    assert_eq!(
        replies.bodies_as::<OrderPlaced>().unwrap(),
        vec![OrderPlaced {
            order_id: "o-1".into()
        }]
    );

    let processed = bus.processed_messages().transport_messages();
    let reply = &replies.transport_messages()[0];
    assert_eq!(
        reply.header(headers::IN_REPLY_TO),
        processed[0].header(headers::MESSAGE_ID)
    );
    assert_eq!(
        reply.header(headers::CORRELATION_ID),
        processed[0].header(headers::CORRELATION_ID)
    );
    assert_eq!(
        reply.header(headers::RETURN_ADDRESS),
        Some(bus.options().input_queue_name())
    );
}

#[test]
fn messages_sent_from_tests_carry_default_headers() {
    let (clock, bus) = bus_with(HandlerPipeline::new());
    bus.send(&Greeting::new("hi")).unwrap();

    let message = &bus.pending_messages().transport_messages()[0];
    let id = message.header(headers::MESSAGE_ID).unwrap();
    assert_eq!(message.header(headers::CORRELATION_ID), Some(id));
    assert_eq!(
        message.header(headers::RETURN_ADDRESS),
        Some(bus.options().reply_queue_name())
    );
    assert_eq!(message.header(headers::INTENT), Some(headers::INTENT_POINT_TO_POINT));
    assert_eq!(
        message.header(headers::SENT_TIME),
        Some(headers::format_timestamp(testbus::Clock::now(&clock)).as_str())
    );
}

#[test]
fn publish_reaches_subscriber_queue_and_subscribers() {
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    let (_, bus) = bus_with(
        HandlerPipeline::new()
            .handle::<PlaceOrder, _>(|ctx, order| {
                ctx.publish(&OrderPlaced {
                    order_id: order.order_id,
                })?;
                Ok(())
            })
            .handle::<OrderPlaced, _>(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
    );
    bus.subscribe::<OrderPlaced>();

    bus.process_message(&PlaceOrder {
        order_id: "o-1".into(),
        quantity: 1,
    })
    .unwrap();

    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(bus.processed_messages().len(), 2);
    let published = bus.published_messages().transport_messages();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].header(headers::INTENT), Some(headers::INTENT_PUBLISH));
}

#[test]
fn publish_without_subscriptions_reaches_subscriber_queue() {
    let (_, bus) = bus_with(HandlerPipeline::new());
    bus.publish(&OrderPlaced {
        order_id: "o-9".into(),
    })
    .unwrap();

    assert_eq!(
        bus.published_messages().bodies_as::<OrderPlaced>().unwrap(),
        vec![OrderPlaced {
            order_id: "o-9".into()
        }]
    );
    assert!(bus.pending_messages().is_empty());
}

#[test]
fn send_from_a_handler_follows_the_router() {
    init_tracing();
    let bus = TestingBus::builder()
        .with_clock(Arc::new(clock()))
        .with_router(TypeBasedRouter::new().map::<ShipOrder>("shipping"))
        .with_pipeline(HandlerPipeline::new().handle::<PlaceOrder, _>(|ctx, order| {
            ctx.send(&ShipOrder {
                order_id: order.order_id,
            })?;
            Ok(())
        }))
        .build()
        .unwrap();

    bus.process_message(&PlaceOrder {
        order_id: "o-2".into(),
        quantity: 1,
    })
    .unwrap();

    let shipping = bus.get_messages("Shipping").unwrap();
    assert_eq!(
        shipping.bodies_as::<ShipOrder>().unwrap(),
        vec![ShipOrder {
            order_id: "o-2".into()
        }]
    );
}

#[test]
fn send_from_a_test_ignores_the_router() {
    init_tracing();
    let bus = TestingBus::builder()
        .with_router(TypeBasedRouter::new().map::<ShipOrder>("shipping"))
        .build()
        .unwrap();

    bus.send(&ShipOrder {
        order_id: "o-3".into(),
    })
    .unwrap();

    assert_eq!(bus.pending_messages().len(), 1);
    assert!(bus.get_messages("shipping").unwrap().is_empty());
}

#[test]
fn failing_handler_moves_message_to_error_queue() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let options = TestingOptions::builder()
        .with_error_queue_name("Errors")
        .build()
        .unwrap();
    let (_, bus) = bus_with_options(
        HandlerPipeline::new().handle::<Greeting, _>(move |ctx, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.publish(&Greeting::new("never delivered"))?;
            Err(HandlerError::rejected("oops"))
        }),
        options,
    );

    bus.process_message(&Greeting::new("boom")).unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 5);
    let errors = bus.error_messages().unwrap();
    assert_eq!(errors.queue_name(), "Errors");
    let failed = errors.transport_messages();
    assert_eq!(failed.len(), 1);
    let details = failed[0].header(headers::ERROR_DETAILS).unwrap();
    assert!(details.contains("oops"));
    assert_eq!(details.lines().count(), 5);
    assert_eq!(
        failed[0].header(headers::SOURCE_QUEUE),
        Some(bus.options().input_queue_name())
    );

    assert!(bus.pending_messages().is_empty());
    assert!(bus.published_messages().is_empty());
}

#[test]
fn handler_recovering_on_retry_succeeds() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let (_, bus) = bus_with(HandlerPipeline::new().handle::<Greeting, _>(move |ctx, greeting| {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
            return Err(HandlerError::rejected("transient"));
        }
        ctx.reply(&greeting)?;
        Ok(())
    }));

    bus.process_message(&Greeting::new("eventually")).unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(bus.replied_messages().len(), 1);
    assert_eq!(bus.processed_messages().len(), 1);
    assert!(bus.error_messages().unwrap().is_empty());
}

#[test]
fn failed_attempts_are_tracked_until_the_message_succeeds() {
    let token = CancellationToken::new();
    let cancel = token.clone();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let (_, bus) = bus_with(HandlerPipeline::new().handle::<Greeting, _>(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            cancel.cancel();
            return Err(HandlerError::rejected("first try"));
        }
        Ok(())
    }));

    bus.send(&Greeting::new("retry me")).unwrap();
    let id = bus.pending_messages().transport_messages()[0]
        .header(headers::MESSAGE_ID)
        .unwrap()
        .to_string();

    assert!(matches!(
        bus.process_pending_messages_with(&token),
        Err(BusError::Cancelled)
    ));
    assert_eq!(bus.failed_attempts(&id), 1);
    assert_eq!(bus.pending_messages().len(), 1);

    bus.process_pending_messages().unwrap();
    assert_eq!(bus.failed_attempts(&id), 0);
    assert_eq!(bus.processed_messages().len(), 1);
    assert!(bus.error_messages().unwrap().is_empty());
}

#[test]
fn message_without_handler_ends_in_error_queue() {
    let (_, bus) = bus_with(HandlerPipeline::new());
    bus.process_message(&Greeting::new("nobody listens")).unwrap();

    let failed = bus.error_messages().unwrap().transport_messages();
    assert_eq!(failed.len(), 1);
    assert!(failed[0]
        .header(headers::ERROR_DETAILS)
        .unwrap()
        .contains("no handlers"));
}

#[test]
fn forward_passes_message_on_unchanged() {
    let (_, bus) = bus_with(HandlerPipeline::new().handle::<Greeting, _>(|ctx, _| {
        ctx.forward("audit")?;
        Ok(())
    }));

    bus.process_message(&Greeting::new("copy me")).unwrap();

    let audit = bus.get_messages("audit").unwrap();
    assert_eq!(audit.bodies_as::<Greeting>().unwrap(), vec![Greeting::new("copy me")]);
    let original = &bus.processed_messages().transport_messages()[0];
    let forwarded = &audit.transport_messages()[0];
    assert_eq!(
        forwarded.header(headers::MESSAGE_ID),
        original.header(headers::MESSAGE_ID)
    );
}

#[test]
fn unroutable_send_fails_the_handler() {
    let (_, bus) = bus_with(HandlerPipeline::new().handle::<PlaceOrder, _>(|ctx, order| {
        match ctx.send(&ShipOrder {
            order_id: order.order_id,
        }) {
            Err(BusError::Routing(_)) => Err(HandlerError::rejected("unroutable")),
            other => other.map_err(HandlerError::from),
        }
    }));

    bus.process_message(&PlaceOrder {
        order_id: "o-4".into(),
        quantity: 1,
    })
    .unwrap();

    let failed = bus.error_messages().unwrap().transport_messages();
    assert!(failed[0]
        .header(headers::ERROR_DETAILS)
        .unwrap()
        .contains("unroutable"));
}

#[test]
fn sagas_and_data_bus_are_visible_to_tests() {
    let (_, bus) = bus_with(HandlerPipeline::new().handle::<PlaceOrder, _>(|ctx, order| {
        let saga = SagaData::new(&order.order_id, &json!({ "order_id": order.order_id, "quantity": order.quantity }))?;
        ctx.sagas().insert(saga)?;
        ctx.data_bus()
            .save_as(&order.order_id, vec![0u8; order.quantity as usize], Default::default());
        Ok(())
    }));

    bus.process_message(&PlaceOrder {
        order_id: "o-5".into(),
        quantity: 3,
    })
    .unwrap();

    let sagas = bus.saga_data();
    assert_eq!(sagas.len(), 1);
    assert_eq!(sagas[0].id, "o-5");
    assert_eq!(sagas[0].data["quantity"], 3);
    assert_eq!(bus.data_bus().attachment_ids(), vec!["o-5"]);
    assert_eq!(bus.data_bus().size_bytes(), 3);
}
