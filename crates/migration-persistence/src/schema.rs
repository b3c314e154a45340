// Esquema Diesel. Tabla: documents
// Un documento se identifica por (db_name, collection, doc_key); doc_key es
// la forma JSON canónica del id y body el documento serializado.
diesel::table! {
    documents (db_name, collection, doc_key) {
        db_name -> Text,
        collection -> Text,
        doc_key -> Text,
        body -> Text,
        updated_at_ts -> BigInt,
    }
}
