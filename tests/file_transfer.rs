use std::io::Write;
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

use rft::{Config, Receiver, Sender};

fn free_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn small_test_config() -> Config {
    let mut config = Config::default();
    config.payload = 4;
    config.buffer_size = 16;
    config.init_sws = 4;
    config.min_window_size = 2;
    config.max_window_size = 32;
    config.init_rto = Duration::from_millis(200);
    config.max_rto = Duration::from_secs(2);
    config.retrans_check_time = Duration::from_millis(50);
    config.fin_timeout = Duration::from_millis(200);
    config
}

fn roundtrip(contents: &[u8], config: Config) -> Vec<u8> {
    let port = free_port();
    let dir = std::env::temp_dir();
    let pid = std::process::id();
    let src_path = dir.join(format!("rft_it_src_{pid}_{port}"));
    let dst_path = dir.join(format!("rft_it_dst_{pid}_{port}"));

    {
        let mut f = std::fs::File::create(&src_path).unwrap();
        f.write_all(contents).unwrap();
    }

    let recv_config = config.clone();
    let dst_path_recv = dst_path.clone();
    let recv_handle = thread::spawn(move || {
        let receiver = Receiver::listen(port, recv_config).unwrap();
        receiver.receive_file(&dst_path_recv).unwrap();
    });

    // Give the receiver a moment to bind before the sender's first SYN.
    thread::sleep(Duration::from_millis(50));

    let sender = Sender::connect("127.0.0.1", port, config).unwrap();
    sender.send_file(&src_path, contents.len() as u64).unwrap();

    recv_handle.join().unwrap();

    let out = std::fs::read(&dst_path).unwrap();
    let _ = std::fs::remove_file(&src_path);
    let _ = std::fs::remove_file(&dst_path);
    out
}

#[test]
fn small_file_transfers_byte_for_byte() {
    let contents = b"abcdef".to_vec();
    let out = roundtrip(&contents, small_test_config());
    assert_eq!(out, contents);
}

#[test]
fn multi_window_file_transfers_in_order() {
    let contents: Vec<u8> = (0..200u32).flat_map(|i| i.to_be_bytes()).collect();
    let out = roundtrip(&contents, small_test_config());
    assert_eq!(out, contents);
}

#[test]
fn prefix_shorter_than_file_is_respected() {
    let port = free_port();
    let dir = std::env::temp_dir();
    let pid = std::process::id();
    let src_path = dir.join(format!("rft_it_prefix_src_{pid}_{port}"));
    let dst_path = dir.join(format!("rft_it_prefix_dst_{pid}_{port}"));

    let full: Vec<u8> = (0u8..=255).collect();
    {
        let mut f = std::fs::File::create(&src_path).unwrap();
        f.write_all(&full).unwrap();
    }

    let config = small_test_config();
    let recv_config = config.clone();
    let dst_path_recv = dst_path.clone();
    let recv_handle = thread::spawn(move || {
        let receiver = Receiver::listen(port, recv_config).unwrap();
        receiver.receive_file(&dst_path_recv).unwrap();
    });

    thread::sleep(Duration::from_millis(50));

    let sender = Sender::connect("127.0.0.1", port, config).unwrap();
    sender.send_file(&src_path, 100).unwrap();
    recv_handle.join().unwrap();

    let out = std::fs::read(&dst_path).unwrap();
    let _ = std::fs::remove_file(&src_path);
    let _ = std::fs::remove_file(&dst_path);
    assert_eq!(out, full[..100]);
}
