use state_machines::state_machine;

state_machine! {
    name: IngestionMachine,
    state: IngestionState,
    initial: Received,
    states: [Received, Extracted, Chunked, Embedded, Persisted, Failed],
    events {
        extract { transition: { from: Received, to: Extracted } }
        chunk { transition: { from: Extracted, to: Chunked } }
        embed { transition: { from: Chunked, to: Embedded } }
        persist { transition: { from: Embedded, to: Persisted } }
        abort {
            transition: { from: Received, to: Failed }
            transition: { from: Extracted, to: Failed }
            transition: { from: Chunked, to: Failed }
            transition: { from: Embedded, to: Failed }
        }
    }
}

pub fn received() -> IngestionMachine<(), Received> {
    IngestionMachine::new(())
}
