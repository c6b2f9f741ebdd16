use approx::assert_relative_eq;
use kari_core::{
    DeliveryMode, KariError, LocalTransport, Node, NodeInfo, Point, PoseStamped,
    PublisherChannel, Scheduler, SchedulerConfig, ShutdownToken, StringMsg, SubscriptionHandler,
    Transport,
};
use kari_estimator::{EstimatorConfig, EstimatorNode};
use parking_lot::Mutex;
use std::sync::Arc;

fn fast_config() -> EstimatorConfig {
    let mut config = EstimatorConfig::default();
    config.scheduler = SchedulerConfig::with_rate(500.0);
    config
}

fn manual_transport() -> Arc<LocalTransport> {
    Arc::new(LocalTransport::new(DeliveryMode::Manual).unwrap())
}

#[test]
fn test_n_ticks_publish_gapless_greetings() {
    let transport = manual_transport();
    let config = fast_config();

    let heard = Arc::new(Mutex::new(Vec::new()));
    let sink = heard.clone();
    let mut listener = SubscriptionHandler::open(transport.clone(), "chatter", 1000, move |msg: StringMsg| {
        sink.lock().push(msg.data);
        Ok(())
    })
    .unwrap();

    let mut node = EstimatorNode::new(transport.clone(), &config).unwrap();
    let mut scheduler = Scheduler::new(config.scheduler.clone(), ShutdownToken::new());
    let metrics = scheduler.run_ticks(&mut node, 8).unwrap();

    // Nothing was pumped while running; closing the publisher flushes it
    transport.pump();
    listener.dispatch().unwrap();

    let expected: Vec<String> = (0..8).map(|i| format!("hello world {}", i)).collect();
    assert_eq!(*heard.lock(), expected);
    assert_eq!(node.count(), 8);
    assert_eq!(metrics.messages_sent, 8);
    assert!(node.chatter().is_closed());
    assert!(node.pose_subscription().is_closed());
}

#[test]
fn test_pose_updates_reach_the_callback() {
    let transport = manual_transport();
    let config = fast_config();
    let mut node = EstimatorNode::new(transport.clone(), &config).unwrap();
    let poses = PublisherChannel::<PoseStamped>::open(transport.clone(), "/mavros/local_position/pose", 10).unwrap();

    let mut ctx = NodeInfo::new("kari_estimator");
    node.init(&mut ctx).unwrap();
    assert!(node.latest_pose().is_none());

    poses.send(PoseStamped::at("map", Point::new(1.5, 0.0, 2.0))).unwrap();
    poses.send(PoseStamped::at("map", Point::new(2.25, -1.0, 2.0))).unwrap();
    transport.pump();
    node.tick(&mut ctx).unwrap();

    let latest = node.latest_pose().unwrap();
    assert_relative_eq!(latest.position().x, 2.25);
    assert_relative_eq!(latest.position().y, -1.0);
    assert_eq!(ctx.metrics().messages_received, 2);

    // A tick with nothing buffered keeps the last pose
    node.tick(&mut ctx).unwrap();
    assert_relative_eq!(node.latest_pose().unwrap().position().x, 2.25);
    assert_eq!(ctx.metrics().messages_received, 2);
}

#[test]
fn test_pose_queue_drops_oldest_between_ticks() {
    let transport = manual_transport();
    let mut config = fast_config();
    config.pose.queue_size = 3;
    let mut node = EstimatorNode::new(transport.clone(), &config).unwrap();
    let poses = PublisherChannel::<PoseStamped>::open(transport.clone(), "/mavros/local_position/pose", 10).unwrap();

    for i in 0..5 {
        poses.send(PoseStamped::at("map", Point::new(i as f64, 0.0, 0.0))).unwrap();
        transport.pump();
    }

    let mut ctx = NodeInfo::new("kari_estimator");
    node.tick(&mut ctx).unwrap();

    assert_eq!(ctx.metrics().messages_received, 3);
    assert_eq!(node.pose_subscription().metrics().messages_dropped, 2);
    assert_relative_eq!(node.latest_pose().unwrap().position().x, 4.0);
}

#[test]
fn test_tick_after_shutdown_is_fatal() {
    let transport = manual_transport();
    let mut node = EstimatorNode::new(transport, &fast_config()).unwrap();
    let mut ctx = NodeInfo::new("kari_estimator");

    node.shutdown(&mut ctx).unwrap();
    let err = node.tick(&mut ctx).unwrap_err();
    assert!(matches!(err, KariError::ChannelClosed { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_type_clash_on_chatter_fails_startup() {
    let transport = manual_transport();
    let _squatter = PublisherChannel::<PoseStamped>::open(transport.clone(), "chatter", 10).unwrap();

    assert!(matches!(
        EstimatorNode::new(transport, &fast_config()),
        Err(KariError::TopicRegistration { .. })
    ));
}

#[test]
fn test_dead_transport_stops_the_loop() {
    let transport = manual_transport();
    let config = fast_config();
    let mut node = EstimatorNode::new(transport.clone(), &config).unwrap();

    let liveness = transport.clone();
    let mut scheduler = Scheduler::new(config.scheduler.clone(), ShutdownToken::new())
        .with_liveness_check(move || liveness.is_ok());

    transport.shutdown();
    let metrics = scheduler.run(&mut node).unwrap();
    assert_eq!(metrics.total_ticks, 0);
    assert!(node.chatter().is_closed());
}
