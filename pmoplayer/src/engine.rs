//! Abstraction du moteur audio piloté par le contrôleur
//!
//! Le contrôleur ne décode rien : il commande un moteur (élément média du
//! navigateur, pipeline natif, mock de test) et réagit à ses événements.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

use crate::errors::Result;

/// Événements émis par un moteur audio
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Les métadonnées sont chargées, la durée est connue (secondes)
    MetadataLoaded { duration: f64 },
    /// Progression de la lecture (secondes)
    TimeUpdate { position: f64 },
    /// Fin naturelle de la ressource
    Ended,
}

/// Commandes de transport et de volume d'un moteur audio.
///
/// Une instance est liée à une seule source : le contrôleur en crée une
/// nouvelle à chaque changement de source et appelle [`AudioEngine::release`]
/// sur l'ancienne.
pub trait AudioEngine: Send {
    /// Associe l'URL à lire. Le chargement est asynchrone et se termine par
    /// un [`EngineEvent::MetadataLoaded`].
    fn set_source(&self, url: &str) -> Result<()>;

    /// Démarre ou reprend la lecture.
    fn play(&self) -> Result<()>;

    /// Met la lecture en pause.
    fn pause(&self) -> Result<()>;

    /// Positionne la tête de lecture (secondes).
    fn seek(&self, position: f64) -> Result<()>;

    /// Volume dans `[0, 1]`.
    fn set_volume(&self, volume: f64) -> Result<()>;

    /// Active ou désactive le mute sans toucher au volume.
    fn set_muted(&self, muted: bool) -> Result<()>;

    /// Libère les ressources du moteur. Appelé une seule fois.
    fn release(&self);

    /// Abonnement aux événements de ce moteur.
    fn subscribe(&self) -> EngineSubscription;
}

/// Fabrique de moteurs, une instance par source
pub trait EngineFactory {
    fn create(&self) -> Result<Box<dyn AudioEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Result<Box<dyn AudioEngine>>,
{
    fn create(&self) -> Result<Box<dyn AudioEngine>> {
        self()
    }
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    subscribers: Vec<(u64, Sender<EngineEvent>)>,
}

/// Bus de diffusion des événements d'un moteur
///
/// Les implémentations d'[`AudioEngine`] en possèdent un et y publient leurs
/// événements ; chaque abonné reçoit sa propre file.
#[derive(Clone, Default)]
pub struct EngineEventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EngineEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> EngineSubscription {
        let (tx, rx) = unbounded::<EngineEvent>();
        let id = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, tx));
            id
        };

        EngineSubscription {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn broadcast(&self, event: EngineEvent) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }
}

/// File d'événements d'un abonné ; se désabonne du bus quand elle est droppée
pub struct EngineSubscription {
    id: u64,
    rx: Receiver<EngineEvent>,
    bus: Weak<Mutex<BusInner>>,
}

impl EngineSubscription {
    /// Événement suivant s'il y en a un, sans bloquer
    pub fn try_next(&self) -> Option<EngineEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Vide la file
    pub fn drain(&self) -> Vec<EngineEvent> {
        self.rx.try_iter().collect()
    }
}

impl Drop for EngineSubscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            let mut inner = bus.lock().unwrap_or_else(PoisonError::into_inner);
            inner.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}
