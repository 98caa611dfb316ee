use criterion::{Criterion, black_box, criterion_group, criterion_main};
use partybox::output::OutputDescriptor;
use partybox::{AnnouncePacket, MediaRef, Notification, ServerIdentity};

fn announce_benchmark(c: &mut Criterion) {
    let packet = AnnouncePacket::new(ServerIdentity::new(), "192.168.1.20".parse().unwrap(), 8234)
        .with_name("Living Room")
        .with_media_port(8234);
    let encoded = packet.encode().unwrap();

    c.bench_function("announce_encode", |b| {
        b.iter(|| black_box(&packet).reissue().encode().unwrap())
    });

    c.bench_function("announce_decode", |b| {
        b.iter(|| AnnouncePacket::decode(black_box(&encoded)).unwrap())
    });
}

fn notification_benchmark(c: &mut Criterion) {
    let now_playing = Notification::NowPlaying {
        media: Some(
            MediaRef::new("http://radio.example.com/stream.mp3")
                .with_title("Opener")
                .with_artist("Somebody")
                .with_duration(241.5),
        ),
    };
    let line = now_playing.encode().unwrap();
    let output = Notification::OutputReconfigured {
        descriptor: OutputDescriptor::default(),
    };

    c.bench_function("notification_encode_now_playing", |b| {
        b.iter(|| black_box(&now_playing).encode().unwrap())
    });

    c.bench_function("notification_decode_now_playing", |b| {
        b.iter(|| Notification::decode(black_box(&line)).unwrap())
    });

    c.bench_function("notification_encode_output", |b| {
        b.iter(|| black_box(&output).encode().unwrap())
    });
}

criterion_group!(benches, announce_benchmark, notification_benchmark);
criterion_main!(benches);
