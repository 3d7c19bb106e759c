//! The WebSocket service: control events arrive on `/ws/events`, published
//! views are broadcast to every `/ws/views` peer.
//!
//! The server bridges the sockets into the same `(events, write)` pair the
//! stdio loop uses, so the streamer runs unchanged over either transport.
//! One thread per connection; the dataset behind the session is shared
//! read-only.

use std::{
    net::{TcpListener, TcpStream},
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
    thread::spawn,
};

use tracing::{error, warn};
use tungstenite::{
    accept_hdr,
    handshake::server::{Request, Response},
    Message, WebSocket,
};

use crate::streamer;

type Peers = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

pub fn service(
    addr: &str,
) -> (
    impl Iterator<Item = Result<String, std::io::Error>>,
    impl FnMut(String),
) {
    let addr = addr.to_string();
    let (event_producer, event_receiver) = mpsc::channel::<String>();
    let (view_producer, view_receiver) = mpsc::channel::<String>();
    spawn(move || start_server(&addr, event_producer, view_receiver));
    streamer::channels(event_receiver, view_producer)
}

fn start_server(addr: &str, event_producer: Sender<String>, view_receiver: Receiver<String>) {
    let peers: Peers = Arc::new(Mutex::new(vec![]));
    start_dispatcher(peers.clone(), view_receiver);
    start_websockets(addr, peers, event_producer);
}

fn start_websockets(addr: &str, peers: Peers, event_producer: Sender<String>) {
    let server = match TcpListener::bind(addr) {
        Ok(server) => server,
        Err(reason) => {
            error!(%addr, %reason, "cannot bind the service socket");
            return;
        }
    };
    for stream in server.incoming() {
        let peers = peers.clone();
        let event_producer = event_producer.clone();
        spawn(move || {
            if let Some((path, websocket)) = get_websocket(stream) {
                if path.ends_with("/ws/events") {
                    handle_event_receiver(websocket, event_producer)
                } else if path.ends_with("/ws/views") {
                    handle_view_peer(websocket, peers)
                }
            }
        });
    }
}

fn get_websocket(
    stream: Result<TcpStream, std::io::Error>,
) -> Option<(String, WebSocket<TcpStream>)> {
    let mut path: String = String::new();
    let callback = |req: &Request, response: Response| {
        path = String::from(req.uri().path());
        Ok(response)
    };
    let stream = match stream {
        Ok(stream) => stream,
        Err(reason) => {
            warn!(%reason, "connection failed");
            return None;
        }
    };
    match accept_hdr(stream, callback) {
        Ok(websocket) => Some((path, websocket)),
        Err(reason) => {
            warn!(%reason, "websocket handshake failed");
            None
        }
    }
}

fn handle_view_peer(websocket: WebSocket<TcpStream>, peers: Peers) {
    let mut peers = peers.lock().unwrap();
    peers.push(websocket);
}

fn handle_event_receiver(mut websocket: WebSocket<TcpStream>, event_producer: Sender<String>) {
    spawn(move || loop {
        let msg = websocket.read_message();
        match msg {
            Ok(message) => {
                if !read_events(message, &event_producer) {
                    break;
                }
            }
            Err(reason) => {
                warn!(%reason, "event socket closed");
                break;
            }
        };
    });
}

fn read_events(message: Message, event_producer: &Sender<String>) -> bool {
    match message {
        Message::Text(txt) => {
            if let Err(reason) = event_producer.send(txt) {
                warn!(%reason, "event channel closed");
            }
            true
        }
        Message::Binary(_) => {
            warn!("unsupported binary message");
            true
        }
        Message::Close(_) => false,
        _ => true,
    }
}

fn start_dispatcher(peers: Peers, view_receiver: Receiver<String>) {
    spawn(move || {
        for msg in view_receiver {
            let mut peers = peers.lock().unwrap();
            peers.retain_mut(|peer| send_views(peer, msg.clone()));
        }
    });
}

fn send_views(peer: &mut WebSocket<TcpStream>, msg: String) -> bool {
    if peer.can_write() {
        if let Err(reason) = peer.write_message(Message::Text(msg)) {
            warn!(%reason, "view peer dropped a message");
        };
        true
    } else {
        false
    }
}
