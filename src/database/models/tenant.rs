use super::{IndexSpec, ModelDefinition};

/// Models bound on every tenant connection before business logic sees it.
pub static TENANT_MODELS: &[ModelDefinition] = &[
    ModelDefinition {
        name: "Cultivo",
        collection: "cultivos",
        indexes: &[IndexSpec { keys: &[("nombre", 1)], unique: false }],
    },
    ModelDefinition {
        name: "Tarea",
        collection: "tareas",
        indexes: &[
            IndexSpec { keys: &[("fecha", 1)], unique: false },
            IndexSpec { keys: &[("cultivoId", 1), ("estado", 1)], unique: false },
        ],
    },
    ModelDefinition {
        name: "Nota",
        collection: "notas",
        indexes: &[IndexSpec { keys: &[("creadoEn", -1)], unique: false }],
    },
    ModelDefinition {
        name: "Comentario",
        collection: "comentarios",
        indexes: &[IndexSpec { keys: &[("tareaId", 1), ("creadoEn", -1)], unique: false }],
    },
    ModelDefinition {
        name: "Usuario",
        collection: "usuarios",
        indexes: &[IndexSpec { keys: &[("email", 1)], unique: true }],
    },
    ModelDefinition {
        name: "Conversacion",
        collection: "conversaciones",
        indexes: &[IndexSpec { keys: &[("actualizadoEn", -1)], unique: false }],
    },
];
