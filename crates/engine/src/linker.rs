//! Conversation/contact linking.
//!
//! Every conversation must carry a linked contact before tool execution can
//! target it. The link is lazy: created on first need from the
//! conversation's denormalized visitor data.

use std::sync::Arc;

use tracing::{debug, info};

use konsul_core::contact::{Contact, ContactId};
use konsul_core::conversation::Conversation;
use konsul_core::error::Error;
use konsul_core::store::{ContactStore, ConversationStore};

/// The result of ensuring a conversation has a contact.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub contact_id: ContactId,
    /// Whether this call created (and linked) a new contact.
    pub created: bool,
}

/// Lazily links conversations to contacts.
pub struct ContactLinker {
    conversations: Arc<dyn ConversationStore>,
    contacts: Arc<dyn ContactStore>,
}

impl ContactLinker {
    pub fn new(conversations: Arc<dyn ConversationStore>, contacts: Arc<dyn ContactStore>) -> Self {
        Self {
            conversations,
            contacts,
        }
    }

    /// Return the conversation's linked contact, creating one on first need.
    ///
    /// Idempotent under retry: the store-side link is a compare-and-swap, so
    /// a caller that loses a concurrent race gets the winner's contact id
    /// back instead of double-linking.
    pub async fn ensure_contact(&self, conversation: &Conversation) -> Result<LinkOutcome, Error> {
        if let Some(existing) = &conversation.contact_id {
            return Ok(LinkOutcome {
                contact_id: existing.clone(),
                created: false,
            });
        }

        let contact = Contact::new(&conversation.workspace_id)
            .with_name(conversation.contact_name.clone())
            .with_email(conversation.contact_email.clone())
            .with_external_id(Some(conversation.external_id.clone()));

        let our_id = self.contacts.create_contact(contact).await?;
        let linked = self
            .conversations
            .link_contact(&conversation.id, &our_id)
            .await?;

        let created = linked == our_id;
        if created {
            info!(
                conversation_id = %conversation.id,
                contact_id = %linked,
                "Linked new contact to conversation"
            );
        } else {
            debug!(
                conversation_id = %conversation.id,
                contact_id = %linked,
                "Lost linking race, using existing contact"
            );
        }

        Ok(LinkOutcome {
            contact_id: linked,
            created,
        })
    }
}
