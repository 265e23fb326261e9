use board::Color;
use chain::{Block, BlockFinalized, Link};
use monke::MonkePlayer;
use quickcheck::quickcheck;
use room::{Envelope, Inbound, LocalHub, PeerId};
use session::{simulate, Error, LocalRoom, SimulationConfig};
use turns::TurnAction;

/// A hosted room with `joiners` more peers, every join fully delivered
fn room_of(hub: LocalHub, capacity: usize, joiners: usize) -> (LocalRoom, PeerId, Vec<PeerId>) {
    let mut room = LocalRoom::new(hub);
    let host = room.host(capacity).unwrap();
    room.pump().unwrap();
    let peers = (0..joiners)
        .map(|_| {
            let peer = room.join(capacity);
            room.pump().unwrap();
            peer
        })
        .collect();
    (room, host, peers)
}

/// Let the seated players move until the host has committed `plies` moves or the game ends
fn play(room: &mut LocalRoom, host: PeerId, plies: usize, seed: u64) {
    let mut white = MonkePlayer::seeded(seed);
    let mut black = MonkePlayer::seeded(seed + 1);
    for _ in 0..plies * 8 {
        let game = room.session(host).unwrap().committed();
        if game.is_over() || game.plies() >= plies {
            return;
        }
        for session in room.sessions_mut() {
            match session.seat() {
                Some(Color::White) => session.act(&mut white).unwrap(),
                Some(Color::Black) => session.act(&mut black).unwrap(),
                None => false,
            };
        }
        room.pump().unwrap();
    }
    panic!("the game stalled");
}

#[test]
fn test_seats_fill_in_arrival_order() {
    let (room, host, peers) = room_of(LocalHub::new(), 4, 3);
    for session in room.sessions() {
        let seats = session.seats();
        assert_eq!(seats.white, Some(host));
        assert_eq!(seats.black, Some(peers[0]));
        assert_eq!(seats.spectators, 2);
        assert_eq!(session.host_id(), Some(host));
    }
    assert_eq!(room.session(peers[1]).unwrap().seat(), None);
}

#[test]
fn test_full_room_turns_newcomers_away() {
    let (mut room, host, peers) = room_of(LocalHub::new(), 2, 1);
    let late = room.join(2);
    room.pump().unwrap();
    let seats = room.session(host).unwrap().seats();
    assert_eq!(seats.black, Some(peers[0]));
    assert_eq!(seats.spectators, 0);
    assert_eq!(room.session(late).unwrap().seat(), None);
    assert!(room.session(host).unwrap().room().player(late).is_none());
}

#[test]
fn test_peers_agree_after_a_game() {
    let (mut room, host, _) = room_of(LocalHub::new(), 4, 2);
    play(&mut room, host, 20, 3);
    let digest = room.check_agreement(host).unwrap();
    let session = room.session(host).unwrap();
    assert_eq!(session.chain().tail_link(), digest);
    assert!(session.committed().plies() >= 20 || session.committed().is_over());
}

#[test]
fn test_repeated_block_changes_nothing() {
    let (mut room, host, peers) = room_of(LocalHub::new(), 4, 1);
    play(&mut room, host, 2, 11);
    let block = room.session(host).unwrap().chain().blocks()[0].clone();
    let envelope = Envelope::new(host, &BlockFinalized(block)).unwrap();

    let peer = room.session_mut(peers[0]).unwrap();
    let before = (peer.chain().len(), peer.committed().clone());
    peer.handle(Inbound::Message(envelope)).unwrap();
    assert_eq!((peer.chain().len(), peer.committed().clone()), before);
    room.check_agreement(host).unwrap();
}

#[test]
fn test_seat_stays_empty_when_its_player_leaves() {
    let (mut room, host, peers) = room_of(LocalHub::new(), 4, 2);
    room.leave(peers[0]);
    room.pump().unwrap();
    for peer in [host, peers[1]] {
        let seats = room.session(peer).unwrap().seats();
        assert_eq!(seats.white, Some(host));
        assert_eq!(seats.black, None);
        assert_eq!(seats.spectators, 1);
    }
    assert!(room.session(host).unwrap().room().player(peers[0]).is_none());
}

#[test]
fn test_late_joiner_catches_up_from_a_snapshot() {
    let (mut room, host, _) = room_of(LocalHub::new(), 4, 1);
    play(&mut room, host, 6, 5);
    let late = room.join(4);
    room.pump().unwrap();

    let expected = room.session(host).unwrap();
    let session = room.session(late).unwrap();
    assert_eq!(session.chain().len(), expected.chain().len());
    assert_eq!(session.committed(), expected.committed());
    assert!(!session.is_resyncing());
    room.check_agreement(host).unwrap();
}

#[test]
fn test_losing_the_host_ends_the_session() {
    let (mut room, host, peers) = room_of(LocalHub::new(), 4, 1);
    room.leave(host);
    assert!(matches!(room.pump(), Err(Error::HostDisconnected)));
    let mut player = MonkePlayer::seeded(0);
    let peer = room.session_mut(peers[0]).unwrap();
    assert!(matches!(
        peer.act(&mut player),
        Err(Error::HostDisconnected)
    ));
}

#[test]
fn test_mislinked_block_triggers_a_resync() {
    let (mut room, host, peers) = room_of(LocalHub::new(), 4, 1);
    play(&mut room, host, 2, 13);
    let tail = room.session(host).unwrap().chain().blocks().last().unwrap().clone();
    let forged = Block {
        sequence: tail.sequence + 1,
        link: Link([7; 32]),
        ..tail
    };
    let envelope = Envelope::new(host, &BlockFinalized(forged)).unwrap();

    let peer = room.session_mut(peers[0]).unwrap();
    let held = peer.chain().len();
    peer.handle(Inbound::Message(envelope)).unwrap();
    assert!(peer.is_resyncing());
    assert_eq!(peer.chain().len(), held);

    room.pump().unwrap();
    let peer = room.session(peers[0]).unwrap();
    assert!(!peer.is_resyncing());
    assert_eq!(peer.committed(), room.session(host).unwrap().committed());
    room.check_agreement(host).unwrap();
}

#[test]
fn test_losing_a_slot_race_rolls_back_and_proposes_again() {
    let hub = LocalHub::new();
    let mut room = LocalRoom::new(hub.clone());
    let host = room.host(4).unwrap();
    room.pump().unwrap();
    let peer = room.join(4);

    // Deliver until black's acknowledgement for slot 1 is on its way, but not yet at the host
    while {
        let session = room.session(peer).unwrap();
        session.game() == session.committed()
    } {
        let (to, inbound) = hub.deliver_next().expect("black never acknowledged");
        room.session_mut(to).unwrap().handle(inbound).unwrap();
    }
    assert_eq!(
        room.session(peer).unwrap().game().current_turn().actions(),
        [TurnAction::Move {
            color: Color::Black,
            mv: None
        }]
    );

    // White takes slot 1 first
    let mut white = MonkePlayer::seeded(21);
    assert!(room.session_mut(host).unwrap().act(&mut white).unwrap());
    room.pump().unwrap();

    let session = room.session(host).unwrap();
    let blocks = session.chain().blocks();
    assert!(blocks.len() >= 2);
    assert_eq!(blocks[0].origin, host);
    assert!(matches!(
        blocks[0].payload,
        TurnAction::Move {
            color: Color::White,
            mv: Some(_)
        }
    ));
    assert_eq!(blocks[1].sequence, 2);
    assert_eq!(blocks[1].origin, peer);
    assert_eq!(
        blocks[1].payload,
        TurnAction::Move {
            color: Color::Black,
            mv: None
        }
    );
    assert_eq!(session.committed().plies(), 1);

    let session = room.session(peer).unwrap();
    assert_eq!(session.game(), session.committed());
    room.check_agreement(host).unwrap();
}

quickcheck! {
    fn test_shuffled_delivery_converges(seed: u64) -> bool {
        let config = SimulationConfig {
            peers: 3,
            max_plies: 16,
            seed: Some(seed),
            shuffle: true,
            ..SimulationConfig::default()
        };
        match simulate(&config) {
            Ok(report) => report.outcome.is_some() || report.plies == 16,
            Err(_) => false,
        }
    }
}
